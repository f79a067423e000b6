// SPDX-License-Identifier: GPL-2.0-or-later


mod serve_content;

pub use serve_content::{serve_fmp4_content, serve_mp4_content};
