pub mod collect;
pub mod display_width;
pub mod error;
pub mod filter;
pub mod layout;
pub mod mermaid;
pub mod parser;
pub mod pattern;
pub mod renderer;
pub mod schema;

pub use error::{Error, FilterError, SchemaError};
pub use filter::{Classification, FilterOption, filter};
pub use schema::Schema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Mermaid `erDiagram` text
    #[default]
    Mermaid,
    /// Box drawing for the terminal
    Ascii,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub format: Format,
    pub max_width: Option<usize>,
}

/// Parses an `erDiagram`, slices it with `opt` and renders what is left.
pub fn run(input: &str, opt: &FilterOption, render_opts: &RenderOptions) -> Result<String, Error> {
    let mut schema = parser::parse_schema(input)?;
    let before = schema.tables.len();
    schema.filter(opt)?;
    log::info!("{} of {} tables left after filtering", schema.tables.len(), before);
    render(&schema, render_opts)
}

pub fn render(schema: &Schema, opts: &RenderOptions) -> Result<String, Error> {
    match opts.format {
        Format::Mermaid => Ok(mermaid::write(schema)),
        Format::Ascii => {
            let computed = match opts.max_width {
                Some(w) => layout::compute_with_max_width(schema, w)?,
                None => layout::compute(schema)?,
            };
            Ok(renderer::render(&computed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP: &str = "\
erDiagram
    users {
        bigint id PK
    }
    orders {
        bigint id PK
        bigint user_id FK
    }
    audit_log {
        text entry
    }
    orders }o--|| users : FOREIGN KEY (user_id) REFERENCES users(id)
";

    #[test]
    fn run_filters_and_writes_mermaid() {
        let opt = FilterOption {
            exclude: vec!["audit_log".into()],
            ..FilterOption::default()
        };
        let output = run(SHOP, &opt, &RenderOptions::default()).unwrap();
        assert!(output.starts_with("erDiagram\n"));
        assert!(output.contains("users {"));
        assert!(output.contains("orders }o--|| users"));
        assert!(!output.contains("audit_log"), "got:\n{output}");
    }

    #[test]
    fn run_renders_ascii() {
        let opt = FilterOption {
            include: vec!["orders".into()],
            distance: 1,
            ..FilterOption::default()
        };
        let render_opts = RenderOptions {
            format: Format::Ascii,
            max_width: None,
        };
        let output = run(SHOP, &opt, &render_opts).unwrap();
        assert!(output.contains("│ users"));
        assert!(output.contains("│ orders"));
        assert!(output.contains("user_id"));
        assert!(!output.contains("audit_log"));
    }

    #[test]
    fn run_reports_syntax_error() {
        let err = run("classDiagram\n", &FilterOption::default(), &RenderOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("syntax error"), "got: {err}");
        assert!(err.to_string().contains("classDiagram"), "got: {err}");
    }

    #[test]
    fn run_ascii_with_nothing_left_is_an_error() {
        let opt = FilterOption {
            include: vec!["nothing_matches".into()],
            ..FilterOption::default()
        };
        let render_opts = RenderOptions {
            format: Format::Ascii,
            max_width: None,
        };
        let err = run(SHOP, &opt, &render_opts).unwrap_err();
        assert!(matches!(err, Error::Layout(_)), "got: {err:?}");
    }
}
