//! Renderers for directory listings.

pub mod html;
