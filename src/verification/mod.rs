//! Auxiliary per-domain and per-address signals: disposable providers and avatars.

pub mod disposable;
pub mod gravatar;

pub use disposable::{DisposableChecker, DisposableList};
pub use gravatar::{AvatarChecker, GravatarChecker, NoAvatarCheck};
