// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Built-in tool implementations.

mod markdown_writer;
mod read_file;
mod template;
mod write_file;

pub use markdown_writer::{MarkdownWriterTool, DEFAULT_OUTPUT_DIR};
pub use read_file::ReadFileTool;
pub use template::TemplateTool;
pub use write_file::WriteFileTool;
