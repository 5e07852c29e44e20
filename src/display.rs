//! Colouring for values interpolated into log lines.
//!
//! `display!(x)` borrows `x` and formats it with the style its type asks for.

use std::fmt::{self, Display, Formatter};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use owo_colors::OwoColorize;

use crate::config::address::Address;

pub trait Highlight {
    fn highlight(&self, f: &mut Formatter<'_>) -> fmt::Result;
}

#[doc(hidden)]
pub struct Highlighted<'a, T: ?Sized>(pub &'a T);

impl<T: Highlight + ?Sized> Display for Highlighted<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.highlight(f)
    }
}

macro_rules! display {
    ($x:expr) => {{ $crate::display::Highlighted(&$x) }};
}

impl Highlight for io::Error {
    fn highlight(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bright_red())
    }
}

impl Highlight for Duration {
    fn highlight(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format!("{self:?}").dimmed())
    }
}

impl Highlight for SocketAddr {
    fn highlight(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bright_yellow())
    }
}

impl Highlight for Address {
    fn highlight(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bright_yellow())
    }
}
