mod history;
#[cfg(feature = "serde")]
mod serde;
