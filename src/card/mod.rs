//! The card panel: submit a word to the proxy, show the SVG, export it.

pub mod client;
pub mod notify;
pub mod session;

pub use client::{CardClient, ClientError, ProxyReply};
pub use notify::{Level, LogNotifier, Notifier, RecordingNotifier};
pub use session::{CardSession, CardView, Phase, SubmitOutcome};

#[cfg(test)]
mod tests;
