// TypeTrace - Runtime Type Profiler
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Parser front-end for the instrumenter.
//!
//! Wraps the swc ECMAScript parser: dialect selection by file extension,
//! module parsing, and translation of spans back into byte offsets and
//! line/column positions of the original source.

use swc_core::common::{sync::Lrc, BytePos, FileName, SourceFile, SourceMap};
use swc_core::ecma::ast::{EsVersion, Module};
use swc_core::ecma::parser::{lexer::Lexer, EsConfig, Parser, StringInput, Syntax, TsConfig};
use tracing::warn;

use crate::InstrumentError;

/// File extensions the instrumenter recognises.
pub const DIALECT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// A parsed module together with the positional machinery needed to map
/// spans back onto the original text.
pub struct ParsedModule {
    /// The parsed AST
    pub module: Module,
    /// Source map owning the file (used for line/column lookup)
    pub source_map: Lrc<SourceMap>,
    /// The registered source file (used for byte-offset translation)
    pub source_file: Lrc<SourceFile>,
}

impl ParsedModule {
    /// Byte offset of a position in the original source.
    pub fn offset_of(&self, pos: BytePos) -> usize {
        (pos.0 - self.source_file.start_pos.0) as usize
    }

    /// 1-based line and 0-based column of a position in the original source.
    pub fn line_col_of(&self, pos: BytePos) -> (u32, u32) {
        let loc = self.source_map.lookup_char_pos(pos);
        (loc.line as u32, loc.col_display as u32)
    }
}

/// Pick the parser syntax for a logical filename.
pub fn syntax_for(filename: &str) -> Syntax {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".tsx") {
        Syntax::Typescript(TsConfig { tsx: true, decorators: true, ..Default::default() })
    } else if lower.ends_with(".ts") || lower.ends_with(".mts") || lower.ends_with(".cts") {
        Syntax::Typescript(TsConfig { tsx: false, decorators: true, ..Default::default() })
    } else if lower.ends_with(".jsx") {
        Syntax::Es(EsConfig { jsx: true, ..Default::default() })
    } else {
        Syntax::Es(EsConfig { jsx: false, ..Default::default() })
    }
}

/// Whether the filename carries a recognised dialect extension.
pub fn is_recognised_dialect(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    DIALECT_EXTENSIONS.iter().any(|ext| lower.ends_with(&format!(".{ext}")))
}

/// Parse a source string as a module.
///
/// A hard parser rejection surfaces as [`InstrumentError::SourceUnparseable`];
/// recoverable diagnostics are logged and parsing proceeds.
pub fn parse_module(source: &str, filename: &str) -> Result<ParsedModule, InstrumentError> {
    let source_map: Lrc<SourceMap> = Default::default();
    let source_file = source_map
        .new_source_file(FileName::Custom(filename.to_string()), source.to_string());

    let lexer = Lexer::new(
        syntax_for(filename),
        EsVersion::Es2022,
        StringInput::from(&*source_file),
        None,
    );
    let mut parser = Parser::new_from(lexer);

    let module = parser.parse_module().map_err(|err| InstrumentError::SourceUnparseable {
        filename: filename.to_string(),
        message: err.kind().msg().to_string(),
    })?;

    for err in parser.take_errors() {
        warn!(filename, error = %err.kind().msg(), "recoverable parse diagnostic");
    }

    Ok(ParsedModule { module, source_map, source_file })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_selection_by_extension() {
        assert!(matches!(syntax_for("a.ts"), Syntax::Typescript(c) if !c.tsx));
        assert!(matches!(syntax_for("a.tsx"), Syntax::Typescript(c) if c.tsx));
        assert!(matches!(syntax_for("a.jsx"), Syntax::Es(c) if c.jsx));
        assert!(matches!(syntax_for("a.js"), Syntax::Es(c) if !c.jsx));
        assert!(matches!(syntax_for("a.mjs"), Syntax::Es(_)));
    }

    #[test]
    fn test_recognised_dialects() {
        assert!(is_recognised_dialect("src/app.ts"));
        assert!(is_recognised_dialect("src/APP.TSX"));
        assert!(is_recognised_dialect("lib/x.cjs"));
        assert!(!is_recognised_dialect("style.css"));
        assert!(!is_recognised_dialect("README.md"));
    }

    #[test]
    fn test_parse_failure_is_source_unparseable() {
        let result = parse_module("function (((", "bad.js");
        assert!(matches!(result, Err(InstrumentError::SourceUnparseable { .. })));
    }

    #[test]
    fn test_offsets_are_file_relative() {
        let parsed = parse_module("let x = 1;\nlet y = 2;\n", "a.js").unwrap();
        // The first item starts at offset 0 regardless of the global BytePos base.
        use swc_core::common::Spanned;
        let first = parsed.module.body.first().unwrap();
        assert_eq!(parsed.offset_of(first.span().lo), 0);
        let (line, col) = parsed.line_col_of(first.span().lo);
        assert_eq!((line, col), (1, 0));
    }
}
