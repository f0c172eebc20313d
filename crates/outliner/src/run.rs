use std::path::{Path, PathBuf};

use colored::Colorize;
use outliner_core::{find_outline, outline_to_string, parse_outline, OutlineItem};
use outliner_pdf::PdfDocument;

use crate::params::ParamsArgs;
use crate::prelude::{eprintln, println, *};

/// Title of the marker item added with `--mark`.
pub const MARK_TEXT: &str = "Added by PDFoutliner";

#[derive(Debug, clap::Args)]
pub struct RunOptions {
    /// Input PDF file
    pub input: PathBuf,

    /// Output file (defaults to {input}_outlined.pdf or {input}_outline.txt)
    pub output_file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, env = "PDFOUTLINER_OUTPUT", default_value = "pdf")]
    pub output: OutputFormat,

    /// Extract the outline even if the PDF already has one
    #[arg(long)]
    pub ignore_existing: bool,

    /// Take the outline from a text file when the PDF has none (defaults to
    /// {input}_outline.txt)
    #[arg(long, value_name = "FILE", num_args = 0..=1)]
    pub fromtxt: Option<Option<PathBuf>>,

    #[clap(flatten)]
    pub params: ParamsArgs,

    /// Include "Added by PDFoutliner" as the first outline item
    #[arg(long)]
    pub mark: bool,

    /// Items above this level start expanded in the PDF viewer
    #[arg(long, env = "PDFOUTLINER_FOLD_LEVEL", default_value = "2")]
    pub fold_level: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Write a copy of the PDF with the outline embedded
    Pdf,
    /// Write the outline in the plain-text format
    Txt,
    /// Print the outline in the plain-text format
    Stdout,
    /// Print the outline as JSON
    Json,
}

/// Where the outline written out comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineSource {
    /// The outline already embedded in the PDF.
    Existing,
    /// Heading detection over the PDF's text.
    Extracted,
    /// A plain-text outline file.
    TextFile(PathBuf),
}

/// Pick the outline source. An existing outline wins unless ignored; a text
/// file is only consulted when the PDF has no outline of its own.
pub fn choose_source(
    input: &Path,
    has_existing: bool,
    ignore_existing: bool,
    fromtxt: Option<&Option<PathBuf>>,
) -> OutlineSource {
    match (has_existing, ignore_existing, fromtxt) {
        (true, false, _) => OutlineSource::Existing,
        (true, true, _) | (false, _, None) => OutlineSource::Extracted,
        (false, _, Some(Some(path))) => OutlineSource::TextFile(path.clone()),
        (false, _, Some(None)) => OutlineSource::TextFile(sibling_path(input, "_outline.txt")),
    }
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// `input` without its extension, followed by `suffix`.
pub fn sibling_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(f!("{}{}", stem, suffix))
}

pub fn txt_output_path(input: &Path, output_file: Option<&Path>) -> PathBuf {
    match output_file {
        Some(path) if path.to_string_lossy().ends_with(".txt") => path.to_path_buf(),
        Some(path) => PathBuf::from(f!("{}.txt", path.display())),
        None => sibling_path(input, "_outline.txt"),
    }
}

pub fn pdf_output_path(input: &Path, output_file: Option<&Path>) -> PathBuf {
    output_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| sibling_path(input, "_outlined.pdf"))
}

pub fn run(options: RunOptions) -> Result<()> {
    let input = &options.input;
    if !is_pdf(input) {
        return Err(Error::NotPdf(input.display().to_string()).into());
    }
    let params = options.params.load()?;

    let mut doc = PdfDocument::open(input)
        .wrap_err_with(|| f!("Cannot open {}", input.display()))?;
    let existing = doc.outline()?;

    let source = choose_source(
        input,
        !existing.is_empty(),
        options.ignore_existing,
        options.fromtxt.as_ref(),
    );
    log::debug!("outline source: {:?}", source);

    let mut outline = match &source {
        OutlineSource::Existing => {
            eprintln!("Outline already exists in input PDF; using it");
            existing
        }
        OutlineSource::Extracted => {
            if !existing.is_empty() {
                eprintln!("Outline already exists in input PDF; ignoring it");
            }
            let pages = doc.pages()?;
            find_outline(pages, &params)?
        }
        OutlineSource::TextFile(path) => {
            eprintln!("Using outline from {}", path.display());
            read_outline_file(path)?
        }
    };

    if options.mark {
        outline.insert(0, OutlineItem::new(1, MARK_TEXT, 1));
    }

    let origin = if source == OutlineSource::Existing {
        "Existing"
    } else {
        "Extracted"
    };

    match options.output {
        OutputFormat::Txt => {
            let path = txt_output_path(input, options.output_file.as_deref());
            std::fs::write(&path, outline_to_string(&outline))
                .wrap_err_with(|| f!("Cannot write {}", path.display()))?;
            eprintln!(
                "{}",
                f!("{} outline saved to {}", origin, path.display()).green()
            );
        }
        OutputFormat::Stdout => println!("{}", outline_to_string(&outline)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outline)?),
        OutputFormat::Pdf => {
            if source == OutlineSource::Existing {
                eprintln!("Nothing to do");
                return Ok(());
            }
            let path = pdf_output_path(input, options.output_file.as_deref());
            doc.set_outline(&outline, options.fold_level)?;
            doc.save(&path)
                .wrap_err_with(|| f!("Cannot write {}", path.display()))?;
            eprintln!(
                "{}",
                f!("Saved {} outline items to {}", outline.len(), path.display()).green()
            );
        }
    }

    Ok(())
}

fn read_outline_file(path: &Path) -> Result<Vec<OutlineItem>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::OutlineFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_outline(&content).wrap_err_with(|| f!("Invalid outline file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(Path::new("paper.pdf")));
        assert!(is_pdf(Path::new("dir/PAPER.PDF")));
        assert!(!is_pdf(Path::new("paper.txt")));
        assert!(!is_pdf(Path::new("pdf")));
    }

    #[test]
    fn test_default_output_paths() {
        let input = Path::new("docs/paper.pdf");
        assert_eq!(
            pdf_output_path(input, None),
            PathBuf::from("docs/paper_outlined.pdf")
        );
        assert_eq!(
            txt_output_path(input, None),
            PathBuf::from("docs/paper_outline.txt")
        );
    }

    #[test]
    fn test_explicit_output_paths() {
        let input = Path::new("paper.pdf");
        assert_eq!(
            txt_output_path(input, Some(Path::new("toc"))),
            PathBuf::from("toc.txt")
        );
        assert_eq!(
            txt_output_path(input, Some(Path::new("out/toc.txt"))),
            PathBuf::from("out/toc.txt")
        );
        assert_eq!(
            pdf_output_path(input, Some(Path::new("final.pdf"))),
            PathBuf::from("final.pdf")
        );
    }

    #[test]
    fn test_choose_source() {
        let input = Path::new("a/book.pdf");
        let custom = Some(PathBuf::from("toc.txt"));

        assert_eq!(choose_source(input, true, false, None), OutlineSource::Existing);
        assert_eq!(
            choose_source(input, true, false, Some(&custom)),
            OutlineSource::Existing
        );
        assert_eq!(choose_source(input, true, true, Some(&custom)), OutlineSource::Extracted);
        assert_eq!(choose_source(input, false, false, None), OutlineSource::Extracted);
        assert_eq!(
            choose_source(input, false, false, Some(&custom)),
            OutlineSource::TextFile(PathBuf::from("toc.txt"))
        );
        assert_eq!(
            choose_source(input, false, true, Some(&None)),
            OutlineSource::TextFile(PathBuf::from("a/book_outline.txt"))
        );
    }

    #[test]
    fn test_read_outline_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toc.txt");
        std::fs::write(&path, "Intro\t1\n\tScope\t2\t72,100").unwrap();
        let outline = read_outline_file(&path).unwrap();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[1].level, 2);

        std::fs::write(&path, "Intro\tone").unwrap();
        let err = read_outline_file(&path).unwrap_err();
        assert!(f!("{:#}", err).contains("line 1"));

        assert!(read_outline_file(&dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn test_rejects_non_pdf_input() {
        let options = RunOptions {
            input: PathBuf::from("notes.txt"),
            output_file: None,
            output: OutputFormat::Stdout,
            ignore_existing: false,
            fromtxt: None,
            params: ParamsArgs::default(),
            mark: false,
            fold_level: 2,
        };
        let err = run(options).unwrap_err();
        assert!(err.to_string().contains(".pdf extension"));
    }
}
