//! Image acquisition
//!
//! Turns an uploaded multipart field or a remote URL into a temporary
//! `.jpg` file that lives exactly as long as the request handling it.

pub mod acquire;
pub mod temp;

pub use acquire::{ImageAcquirer, ImageError, ImageSource, DEFAULT_MIME_TYPE};
pub use temp::TempImage;
