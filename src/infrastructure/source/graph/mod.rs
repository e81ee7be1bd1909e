//! Microsoft Graph workbook source.

mod client;
mod dto;
mod locator;

pub use client::{GraphSettings, GraphWorkbookSource};
pub use locator::{RemoteLocator, share_id};
