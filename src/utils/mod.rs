pub mod time;

pub use self::time::*;

pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
