//! Push-model front end.
//!
//! Instead of pulling events, register an [`XmlHandler`] and let the
//! parser drive it. The handler takes the whole event enum in one
//! method so a `match` can be checked for exhaustiveness.

use crate::{FeedParser, ParseStep, ParserConfig, XmlError, XmlEvent};

/// Consumer of parse events.
pub trait XmlHandler {
    fn event(&mut self, event: XmlEvent);
}

impl<F: FnMut(XmlEvent)> XmlHandler for F {
    fn event(&mut self, event: XmlEvent) {
        self(event)
    }
}

/// Parses a complete document, pushing every event into `handler`.
pub fn parse_bytes_into<H: XmlHandler>(
    input: &[u8],
    config: ParserConfig,
    handler: &mut H,
) -> Result<(), XmlError> {
    drive(FeedParser::with_config(config), input, handler)
}

/// Like [`parse_bytes_into`] for input that is already UTF-8 text.
pub fn parse_str_into<H: XmlHandler>(
    input: &str,
    config: ParserConfig,
    handler: &mut H,
) -> Result<(), XmlError> {
    drive(
        FeedParser::with_config(config).with_encoding_hint("UTF-8"),
        input.as_bytes(),
        handler,
    )
}

fn drive<H: XmlHandler>(
    mut parser: FeedParser,
    input: &[u8],
    handler: &mut H,
) -> Result<(), XmlError> {
    parser.push_bytes(input)?;
    parser.push_eof()?;
    loop {
        match parser.next_event()? {
            ParseStep::Event(event) => handler.event(event),
            ParseStep::Finished | ParseStep::NeedMoreInput => return Ok(()),
        }
    }
}
