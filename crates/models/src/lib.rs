pub mod access;

pub use access::{
    decode_access_points, encode_access_points, AccessRequest, AccessSession, ValidAccess,
    ValidationError,
};
