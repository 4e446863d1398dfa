use futures::executor::block_on;
#[cfg(any(feature = "clipboard", test))]
use mmdpack::clipboard::{ClipboardError, ClipboardSink};
use mmdpack::engine::CommandEngine;
use mmdpack::{
    Converter, ConverterConfig, Document, ExportProgress, RasterStrategy, RecordId, RenderEngine,
    RenderState,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Convert(mmdpack::Error),
    NoDiagram,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Convert(err) => write!(f, "{err}"),
            CliError::NoDiagram => write!(f, "No Mermaid diagrams found"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<mmdpack::Error> for CliError {
    fn from(value: mmdpack::Error) -> Self {
        if value.is_extraction_empty() {
            Self::NoDiagram
        } else {
            Self::Convert(value)
        }
    }
}

impl From<mmdpack::error::Error> for CliError {
    fn from(value: mmdpack::error::Error) -> Self {
        mmdpack::Error::from(value).into()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Command {
    #[default]
    List,
    Render,
    Export,
    Copy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum EngineKind {
    #[cfg_attr(feature = "mermaid-rs", default)]
    Native,
    #[cfg_attr(not(feature = "mermaid-rs"), default)]
    Command,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    config: Option<String>,
    scale: Option<f32>,
    strategy: Option<RasterStrategy>,
    engine: EngineKind,
    engine_cmd: Option<String>,
    diagram_id: Option<RecordId>,
    out: Option<String>,
    out_dir: Option<String>,
    verbose: bool,
}

fn usage() -> &'static str {
    "mmdpack\n\
\n\
USAGE:\n\
  mmdpack [list] [<options>] [<path>|-]\n\
  mmdpack render [--id <n>] [--out-dir <dir>] [<options>] [<path>|-]\n\
  mmdpack export [--out <path>] [<options>] [<path>|-]\n\
  mmdpack copy --id <n> [<options>] [<path>|-]\n\
\n\
OPTIONS:\n\
  --config <path>              JSON converter config (camelCase keys)\n\
  --scale <n>                  supersampling factor (default 3)\n\
  --strategy vector|capture    rasterization strategy (default vector)\n\
  --engine native|command      Mermaid renderer (native needs the `mermaid-rs` feature)\n\
  --engine-cmd <program>       external renderer for --engine command (default mmdc)\n\
  --verbose                    log at info level (otherwise RUST_LOG applies)\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', the document is read from stdin.\n\
  - Files must be Markdown (.md, .markdown or .txt).\n\
  - render writes `<Chart N>-<category>.png` files; failed diagrams are reported and skipped.\n\
  - export writes `<prefix>_<YYYYMMDD>_<HHMMSS>.zip` to the current directory unless --out is given.\n\
  - copy needs the `clipboard` feature.\n\
"
}

fn next_value<'a>(it: &mut impl Iterator<Item = &'a String>) -> Result<&'a String, CliError> {
    it.next().ok_or(CliError::Usage(usage()))
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "list" => args.command = Command::List,
            "render" => args.command = Command::Render,
            "export" => args.command = Command::Export,
            "copy" => args.command = Command::Copy,
            "--verbose" | "-v" => args.verbose = true,
            "--config" => args.config = Some(next_value(&mut it)?.clone()),
            "--scale" => {
                let scale = next_value(&mut it)?
                    .parse::<f32>()
                    .map_err(|_| CliError::Usage(usage()))?;
                if !(scale.is_finite() && scale > 0.0) {
                    return Err(CliError::Usage(usage()));
                }
                args.scale = Some(scale);
            }
            "--strategy" => {
                args.strategy = Some(
                    next_value(&mut it)?
                        .parse::<RasterStrategy>()
                        .map_err(|_| CliError::Usage(usage()))?,
                );
            }
            "--engine" => {
                args.engine = match next_value(&mut it)?.as_str() {
                    "native" => EngineKind::Native,
                    "command" => EngineKind::Command,
                    _ => return Err(CliError::Usage(usage())),
                };
            }
            "--engine-cmd" => {
                args.engine_cmd = Some(next_value(&mut it)?.clone());
                args.engine = EngineKind::Command;
            }
            "--id" => {
                let id = next_value(&mut it)?
                    .parse::<u32>()
                    .ok()
                    .and_then(RecordId::new)
                    .ok_or(CliError::Usage(usage()))?;
                args.diagram_id = Some(id);
            }
            "--out" => args.out = Some(next_value(&mut it)?.clone()),
            "--out-dir" => args.out_dir = Some(next_value(&mut it)?.clone()),
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            "-" => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some("-".to_string());
            }
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    if args.command == Command::Copy && args.diagram_id.is_none() {
        return Err(CliError::Usage(usage()));
    }

    Ok(args)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(args: &Args) -> Result<ConverterConfig, CliError> {
    let mut config = match args.config.as_deref() {
        Some(path) => ConverterConfig::from_path(path)?,
        None => ConverterConfig::default(),
    };
    if let Some(scale) = args.scale {
        config.scale = scale;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    Ok(config)
}

fn build_engine(args: &Args) -> Result<Box<dyn RenderEngine>, CliError> {
    match args.engine {
        EngineKind::Command => Ok(Box::new(match args.engine_cmd.as_deref() {
            Some(program) => CommandEngine::new(program),
            None => CommandEngine::default(),
        })),
        #[cfg(feature = "mermaid-rs")]
        EngineKind::Native => Ok(Box::new(mmdpack::engine::NativeEngine)),
        #[cfg(not(feature = "mermaid-rs"))]
        EngineKind::Native => Err(CliError::Usage(
            "mmdpack was built without the `mermaid-rs` feature; use --engine command",
        )),
    }
}

fn load_document<E: RenderEngine>(
    converter: &Converter<E>,
    input: Option<&str>,
) -> Result<Document, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(converter.load(&buf)?)
        }
        Some(path) => Ok(converter.load_path(path)?),
    }
}

fn status_line(state: &RenderState) -> String {
    match state {
        RenderState::Pending => "pending".to_string(),
        RenderState::Rendered { .. } => "rendered".to_string(),
        RenderState::Failed(failure) => {
            let first = failure.message.lines().next().unwrap_or_default();
            format!("failed: {first}")
        }
    }
}

fn run_list(doc: &Document) {
    for record in &doc.records {
        println!(
            "{}\t{}\t{}\t{}",
            record.id(),
            record.display_name(),
            record.category(),
            status_line(record.state())
        );
    }
}

fn run_render<E: RenderEngine>(
    converter: &Converter<E>,
    doc: &Document,
    args: &Args,
) -> Result<(), CliError> {
    let out_dir = PathBuf::from(args.out_dir.as_deref().unwrap_or("."));
    std::fs::create_dir_all(&out_dir)?;

    if let Some(id) = args.diagram_id {
        let single = converter.export_record(doc, id)?;
        let path = out_dir.join(&single.file_name);
        std::fs::write(&path, &single.png)?;
        println!("{}", path.display());
        return Ok(());
    }

    let mut written = 0usize;
    for record in &doc.records {
        match converter.export_record(doc, record.id()) {
            Ok(single) => {
                let path = out_dir.join(&single.file_name);
                std::fs::write(&path, &single.png)?;
                println!("{}", path.display());
                written += 1;
            }
            Err(err) => eprintln!("skipping {}: {err}", record.display_name()),
        }
    }
    if written == 0 {
        return Err(mmdpack::Error::from(mmdpack::ExportError::NothingToExport).into());
    }
    Ok(())
}

fn run_export<E: RenderEngine>(
    converter: &Converter<E>,
    doc: &Document,
    args: &Args,
) -> Result<(), CliError> {
    let timestamp = chrono::Local::now().naive_local();
    let mut report = |progress: ExportProgress| match progress {
        ExportProgress::Rasterizing { current, total } => {
            eprintln!("({current}/{total}) rasterizing");
        }
        ExportProgress::Packaging => eprintln!("packaging"),
    };
    let archive = block_on(converter.export_all(doc, timestamp, &mut report))?;

    let out = match args.out.as_deref() {
        Some(path) => PathBuf::from(path),
        None => Path::new(".").join(&archive.file_name),
    };
    std::fs::write(&out, &archive.bytes)?;
    println!("{}", out.display());
    Ok(())
}

/// Copies one diagram through the clipboard `open` returns; failing to open it is an error.
#[cfg(any(feature = "clipboard", test))]
fn copy_with<E: RenderEngine, S: ClipboardSink>(
    converter: &Converter<E>,
    doc: &Document,
    id: RecordId,
    open: impl FnOnce() -> Result<S, ClipboardError>,
) -> Result<(), CliError> {
    let mut clipboard = open().map_err(mmdpack::Error::from)?;
    converter.copy_record(doc, id, Some(&mut clipboard))?;
    eprintln!("copied diagram {id} to the clipboard");
    Ok(())
}

#[cfg(feature = "clipboard")]
fn run_copy<E: RenderEngine>(
    converter: &Converter<E>,
    doc: &Document,
    id: RecordId,
) -> Result<(), CliError> {
    copy_with(converter, doc, id, mmdpack::clipboard::SystemClipboard::new)
}

#[cfg(not(feature = "clipboard"))]
fn run_copy<E: RenderEngine>(
    converter: &Converter<E>,
    doc: &Document,
    id: RecordId,
) -> Result<(), CliError> {
    converter.copy_record(doc, id, None)?;
    Ok(())
}

fn run(args: Args) -> Result<(), CliError> {
    let config = build_config(&args)?;
    let engine = build_engine(&args)?;
    let converter = Converter::new(engine, config)?;
    let doc = load_document(&converter, args.input.as_deref())?;

    match args.command {
        Command::List => {
            run_list(&doc);
            Ok(())
        }
        Command::Render => run_render(&converter, &doc, &args),
        Command::Export => run_export(&converter, &doc, &args),
        Command::Copy => {
            let id = args.diagram_id.ok_or(CliError::Usage(usage()))?;
            run_copy(&converter, &doc, id)
        }
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => {}
        Err(CliError::NoDiagram) => {
            eprintln!("{}", CliError::NoDiagram);
            std::process::exit(3);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmdpack::EngineError;

    struct FixtureEngine;

    impl RenderEngine for FixtureEngine {
        fn render(&self, target_id: &str, _source: &str) -> Result<String, EngineError> {
            Ok(format!(
                r#"<svg id="{target_id}" xmlns="http://www.w3.org/2000/svg" width="4" height="4"/>"#
            ))
        }
    }

    struct RecordingClipboard<'a>(&'a mut Vec<u8>);

    impl ClipboardSink for RecordingClipboard<'_> {
        fn write(&mut self, _mime: &str, bytes: &[u8]) -> Result<(), ClipboardError> {
            *self.0 = bytes.to_vec();
            Ok(())
        }
    }

    fn loaded() -> (Converter<FixtureEngine>, Document) {
        let converter = Converter::new(FixtureEngine, ConverterConfig::default()).unwrap();
        let doc = converter.load("```mermaid\ngraph TD\n```\n").unwrap();
        (converter, doc)
    }

    #[test]
    fn clipboard_open_errors_keep_their_kind() {
        let (converter, doc) = loaded();

        let err = copy_with(&converter, &doc, RecordId::new(1).unwrap(), || {
            Err::<RecordingClipboard<'_>, _>(ClipboardError::Denied("no display access".into()))
        })
        .unwrap_err();
        assert!(
            matches!(
                err,
                CliError::Convert(mmdpack::Error::Clipboard(ClipboardError::Denied(_)))
            ),
            "{err:?}"
        );
    }

    #[test]
    fn opened_clipboard_receives_the_png() {
        let (converter, doc) = loaded();
        let mut written = Vec::new();

        copy_with(&converter, &doc, RecordId::new(1).unwrap(), || {
            Ok(RecordingClipboard(&mut written))
        })
        .unwrap();
        assert!(written.starts_with(b"\x89PNG\r\n\x1a\n"));
    }
}
