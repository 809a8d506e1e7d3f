pub mod scalar;
pub mod value;

pub use scalar::{Scalar, SigType};
pub use value::{TypeMismatch, Value};
