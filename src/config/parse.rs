use std::iter::Peekable;
use std::str::SplitWhitespace;

pub type ParseStream<'a> = Peekable<SplitWhitespace<'a>>;

pub fn parse_stream(s: &str) -> ParseStream<'_> {
    s.split_whitespace().peekable()
}

pub trait Parse {
    type Output;
    type Error;

    fn parse(stream: &mut ParseStream<'_>) -> Result<Self::Output, Self::Error>;
}
