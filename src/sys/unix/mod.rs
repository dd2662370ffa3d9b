#[cfg(any(target_os = "android", target_os = "linux"))]
mod epoll;

#[cfg(any(target_os = "android", target_os = "linux"))]
pub use self::epoll::{Selector, NAME};

#[cfg(any(target_os = "freebsd", target_os = "macos",
          target_os = "netbsd", target_os = "openbsd"))]
mod kqueue;

#[cfg(any(target_os = "freebsd", target_os = "macos",
          target_os = "netbsd", target_os = "openbsd"))]
pub use self::kqueue::{Selector, NAME};
