// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cstat_cli::{SelectReport, StatsReport, run_select, run_stats, source_from_buffers};
use cstat_core::{AggregationDiagnostics, Cluster, CstatError, PointBuffer};
use cstat_sync::{
    ExternalSelection, HeatmapPayload, SyncConfig, SyncConfigWire, parse_widget_selection,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::env;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Cli {
    verbosity: u8,
    command: Command,
}

#[derive(Debug)]
enum Command {
    Stats(StatsArgs),
    Select(SelectArgs),
}

#[derive(Clone, Debug, Default, PartialEq)]
struct StatsArgs {
    points: Vec<PathBuf>,
    clusters: Option<PathBuf>,
    config: Option<PathBuf>,
    selection: Option<PathBuf>,
    output: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct SelectArgs {
    clusters: Option<PathBuf>,
    selection: Option<PathBuf>,
    output: Option<PathBuf>,
}

#[derive(Debug)]
enum CliError {
    Cstat(CstatError),
    Io {
        context: String,
        source: std::io::Error,
    },
    Json {
        context: String,
        source: serde_json::Error,
    },
    InvalidInput(String),
    NotSupported(String),
}

impl CliError {
    fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Cstat(err) => err.code(),
            Self::InvalidInput(_) => "invalid_input",
            Self::NotSupported(_) => "not_supported",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cstat(err) => write!(f, "{err}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Json { context, source } => write!(f, "{context}: {source}"),
            Self::InvalidInput(msg) => write!(f, "{msg}"),
            Self::NotSupported(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Cstat(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::InvalidInput(_) | Self::NotSupported(_) => None,
        }
    }
}

impl From<CstatError> for CliError {
    fn from(value: CstatError) -> Self {
        Self::Cstat(value)
    }
}

#[derive(Serialize)]
struct StatsOutput {
    command: &'static str,
    payload: HeatmapPayload,
    selection: Vec<u8>,
    diagnostics: AggregationDiagnostics,
}

impl From<StatsReport> for StatsOutput {
    fn from(report: StatsReport) -> Self {
        Self {
            command: "stats",
            payload: report.payload,
            selection: report.selection,
            diagnostics: report.diagnostics,
        }
    }
}

#[derive(Serialize)]
struct SelectOutput {
    command: &'static str,
    selection: Vec<u8>,
    ordinals: Vec<u32>,
    dropped: usize,
}

impl From<SelectReport> for SelectOutput {
    fn from(report: SelectReport) -> Self {
        Self {
            command: "select",
            selection: report.selection,
            ordinals: report.ordinals,
            dropped: report.dropped,
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", error_envelope(&err));
        process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let Some(cli) = parse_cli(&args)? else {
        return Ok(());
    };
    init_tracing(cli.verbosity);

    match cli.command {
        Command::Stats(args) => handle_stats(args),
        Command::Select(args) => handle_select(args),
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn parse_cli(args: &[String]) -> Result<Option<Cli>, CliError> {
    let mut verbosity = 0u8;
    let args = args
        .iter()
        .filter(|arg| match arg.as_str() {
            "-v" | "--verbose" => {
                verbosity = verbosity.saturating_add(1);
                false
            }
            "-vv" => {
                verbosity = verbosity.saturating_add(2);
                false
            }
            _ => true,
        })
        .cloned()
        .collect::<Vec<_>>();

    if args.is_empty() || matches!(args[0].as_str(), "-h" | "--help") {
        print_root_help();
        return Ok(None);
    }
    if matches!(args[0].as_str(), "-V" | "--version") {
        print_version();
        return Ok(None);
    }

    let command_name = args[0].as_str();
    let rest = &args[1..];

    if rest
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_command_help(command_name)?;
        return Ok(None);
    }

    let command = match command_name {
        "stats" => Command::Stats(parse_stats_args(rest)?),
        "select" => Command::Select(parse_select_args(rest)?),
        _ => {
            return Err(CliError::invalid_input(format!(
                "unknown command '{command_name}'; expected one of: stats, select"
            )));
        }
    };

    Ok(Some(Cli { verbosity, command }))
}

fn parse_stats_args(tokens: &[String]) -> Result<StatsArgs, CliError> {
    let mut args = StatsArgs::default();
    let mut flags = PathFlags::new(tokens);
    while let Some((flag, path)) = flags.next_pair()? {
        match flag {
            "--points" => args.points.push(path),
            "--clusters" => args.clusters = Some(path),
            "--config" => args.config = Some(path),
            "--selection" => args.selection = Some(path),
            "--output" => args.output = Some(path),
            _ => {
                return Err(CliError::invalid_input(format!(
                    "unknown stats option '{flag}'"
                )));
            }
        }
    }

    if args.points.is_empty() {
        return Err(CliError::invalid_input("stats requires at least one --points"));
    }
    if args.clusters.is_none() {
        return Err(CliError::invalid_input("stats requires --clusters"));
    }
    Ok(args)
}

fn parse_select_args(tokens: &[String]) -> Result<SelectArgs, CliError> {
    let mut args = SelectArgs::default();
    let mut flags = PathFlags::new(tokens);
    while let Some((flag, path)) = flags.next_pair()? {
        match flag {
            "--clusters" => args.clusters = Some(path),
            "--selection" => args.selection = Some(path),
            "--output" => args.output = Some(path),
            _ => {
                return Err(CliError::invalid_input(format!(
                    "unknown select option '{flag}'"
                )));
            }
        }
    }

    if args.clusters.is_none() {
        return Err(CliError::invalid_input("select requires --clusters"));
    }
    if args.selection.is_none() {
        return Err(CliError::invalid_input("select requires --selection"));
    }
    Ok(args)
}

/// Walks `--flag <path>` and `--flag=<path>` pairs; every option takes a path.
struct PathFlags<'a> {
    tokens: std::slice::Iter<'a, String>,
}

impl<'a> PathFlags<'a> {
    fn new(tokens: &'a [String]) -> Self {
        Self {
            tokens: tokens.iter(),
        }
    }

    fn next_pair(&mut self) -> Result<Option<(&'a str, PathBuf)>, CliError> {
        let Some(token) = self.tokens.next() else {
            return Ok(None);
        };
        if !token.starts_with("--") {
            return Err(CliError::invalid_input(format!(
                "unexpected argument '{token}'; options are written --name <path>"
            )));
        }
        if let Some((flag, path)) = token.split_once('=') {
            return Ok(Some((flag, PathBuf::from(path))));
        }
        match self.tokens.next() {
            Some(path) if !path.starts_with("--") => {
                Ok(Some((token.as_str(), PathBuf::from(path))))
            }
            Some(other) => Err(CliError::invalid_input(format!(
                "{token} expects a path, found option '{other}'"
            ))),
            None => Err(CliError::invalid_input(format!("{token} expects a path"))),
        }
    }
}

fn print_version() {
    println!("cstat {}", env!("CARGO_PKG_VERSION"));
}

fn print_root_help() {
    println!(
        "cstat {}\n\nUSAGE:\n  cstat <COMMAND> [OPTIONS]\n\nCOMMANDS:\n  stats    Aggregate per-cluster statistics and emit the heatmap payload\n  select   Apply an untrusted selection to a cluster partition\n\nGLOBAL OPTIONS:\n  -v, -vv         Raise log level to info/debug (default: RUST_LOG or warn)\n  -h, --help      Show help\n  -V, --version   Show version\n\nRun 'cstat <COMMAND> --help' for subcommand options.",
        env!("CARGO_PKG_VERSION")
    );
}

fn print_command_help(command: &str) -> Result<(), CliError> {
    match command {
        "stats" => {
            println!(
                "USAGE:\n  cstat stats --points <path> [--points <path> ...] --clusters <path> [OPTIONS]\n\nOPTIONS:\n  --points <path>      Point file (.csv or .json); repeat to compose several\n  --clusters <path>    Cluster partition JSON\n  --config <path>      Versioned sync config JSON\n  --selection <path>   Selection message to apply after aggregation\n  --output <path>      Write JSON output to file"
            );
            Ok(())
        }
        "select" => {
            println!(
                "USAGE:\n  cstat select --clusters <path> --selection <path> [OPTIONS]\n\nOPTIONS:\n  --clusters <path>    Cluster partition JSON\n  --selection <path>   Selection message (ordinals, flags or bare array)\n  --output <path>      Write JSON output to file"
            );
            Ok(())
        }
        _ => Err(CliError::invalid_input(format!(
            "unknown command '{command}'; expected one of: stats, select"
        ))),
    }
}

fn handle_stats(args: StatsArgs) -> Result<(), CliError> {
    let buffers = args
        .points
        .iter()
        .map(|path| load_points(path))
        .collect::<Result<Vec<_>, _>>()?;
    let source = source_from_buffers(buffers)?;
    let clusters = load_clusters(required(args.clusters.as_deref(), "--clusters")?)?;
    let config = match args.config.as_deref() {
        Some(path) => load_config(path)?,
        None => SyncConfig::default(),
    };
    let selection = args
        .selection
        .as_deref()
        .map(|path| load_selection(path, clusters.len()))
        .transpose()?;

    info!(
        n = source.num_points(),
        d = source.num_dimensions(),
        clusters = clusters.len(),
        "running stats"
    );
    let report = run_stats(source, clusters, config, selection)?;
    write_json_output(&StatsOutput::from(report), args.output.as_deref())
}

fn handle_select(args: SelectArgs) -> Result<(), CliError> {
    let clusters = load_clusters(required(args.clusters.as_deref(), "--clusters")?)?;
    let selection = load_selection(
        required(args.selection.as_deref(), "--selection")?,
        clusters.len(),
    )?;
    let report = run_select(clusters, &selection)?;
    write_json_output(&SelectOutput::from(report), args.output.as_deref())
}

fn required<'a>(path: Option<&'a Path>, flag: &str) -> Result<&'a Path, CliError> {
    path.ok_or_else(|| CliError::invalid_input(format!("{flag} is required")))
}

fn read_text(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path)
        .map_err(|source| CliError::io(format!("failed to read '{}'", path.display()), source))
}

fn read_json_value(path: &Path) -> Result<Value, CliError> {
    let raw = read_text(path)?;
    serde_json::from_str(raw.as_str())
        .map_err(|source| CliError::json(format!("invalid JSON in '{}'", path.display()), source))
}

fn load_points(path: &Path) -> Result<PointBuffer, CliError> {
    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .ok_or_else(|| {
            CliError::not_supported(format!(
                "unable to infer point format for '{}'; expected .csv or .json",
                path.display()
            ))
        })?;

    let buffer = match extension.as_str() {
        "csv" => parse_csv_points(read_text(path)?.as_str())?,
        "json" => parse_json_points(&read_json_value(path)?)?,
        _ => {
            return Err(CliError::not_supported(format!(
                "unsupported point format '{extension}'; expected .csv or .json"
            )));
        }
    };
    debug!(
        path = %path.display(),
        n = buffer.n(),
        d = buffer.d(),
        "loaded points"
    );
    Ok(buffer)
}

fn parse_csv_points(raw: &str) -> Result<PointBuffer, CliError> {
    let rows = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();

    if rows.is_empty() {
        return Err(CliError::invalid_input("CSV input is empty"));
    }

    let (names, body) = if rows.len() > 1 && first_row_looks_like_header(rows[0], rows[1]) {
        let names = rows[0]
            .split(',')
            .map(|cell| cell.trim().to_string())
            .collect::<Vec<_>>();
        (Some(names), &rows[1..])
    } else {
        (None, &rows[..])
    };

    let (values, n, d) = parse_csv_rows(body)?;
    let buffer = PointBuffer::new(values, n, d)?;
    Ok(match names {
        Some(names) => buffer.with_dimension_names(names),
        None => buffer,
    })
}

fn parse_csv_rows(rows: &[&str]) -> Result<(Vec<f32>, usize, usize), CliError> {
    let mut values = Vec::<f32>::new();
    let mut expected_cols: Option<usize> = None;

    for (row_idx, row) in rows.iter().enumerate() {
        let cells = row.split(',').map(str::trim).collect::<Vec<_>>();

        if let Some(cols) = expected_cols {
            if cells.len() != cols {
                return Err(CliError::invalid_input(format!(
                    "CSV row {} has {} columns but expected {}",
                    row_idx + 1,
                    cells.len(),
                    cols
                )));
            }
        } else {
            expected_cols = Some(cells.len());
        }

        for (col_idx, cell) in cells.iter().enumerate() {
            let value = cell.parse::<f32>().map_err(|_| {
                CliError::invalid_input(format!(
                    "CSV row {} column {} is not a valid float: '{}'",
                    row_idx + 1,
                    col_idx + 1,
                    cell
                ))
            })?;
            values.push(value);
        }
    }

    let d = expected_cols.ok_or_else(|| CliError::invalid_input("CSV input has no data rows"))?;
    Ok((values, rows.len(), d))
}

fn first_row_looks_like_header(first_row: &str, second_row: &str) -> bool {
    let first_cells = first_row.split(',').map(str::trim).collect::<Vec<_>>();
    let second_cells = second_row.split(',').map(str::trim).collect::<Vec<_>>();

    if first_cells.len() != second_cells.len() || first_cells.iter().any(|cell| cell.is_empty()) {
        return false;
    }

    let first_all_non_numeric = first_cells.iter().all(|cell| cell.parse::<f64>().is_err());
    let second_all_numeric = second_cells.iter().all(|cell| cell.parse::<f64>().is_ok());

    first_all_non_numeric && second_all_numeric
}

/// Accepts `{"values": [[..], ..], "dimension_names": [..]}` or a bare array
/// of rows.
fn parse_json_points(value: &Value) -> Result<PointBuffer, CliError> {
    let (rows, names) = match value {
        Value::Array(rows) => (rows, None),
        Value::Object(map) => {
            let rows = map
                .get("values")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    CliError::invalid_input("points JSON must contain a 'values' array")
                })?;
            let names = match map.get("dimension_names") {
                Some(names) => Some(
                    serde_json::from_value::<Vec<String>>(names.clone())
                        .map_err(|source| CliError::json("invalid dimension_names", source))?,
                ),
                None => None,
            };
            (rows, names)
        }
        _ => {
            return Err(CliError::invalid_input(
                "points JSON must be an array of rows or an object with 'values'",
            ));
        }
    };

    let mut values = Vec::<f32>::new();
    let mut expected_cols: Option<usize> = None;
    for (row_idx, row) in rows.iter().enumerate() {
        let cells = row.as_array().ok_or_else(|| {
            CliError::invalid_input(format!("points row {row_idx} is not an array"))
        })?;
        match expected_cols {
            Some(cols) if cols != cells.len() => {
                return Err(CliError::invalid_input(format!(
                    "points row {row_idx} has {} values but expected {cols}",
                    cells.len()
                )));
            }
            Some(_) => {}
            None => expected_cols = Some(cells.len()),
        }
        for (col_idx, cell) in cells.iter().enumerate() {
            let number = cell.as_f64().ok_or_else(|| {
                CliError::invalid_input(format!(
                    "points row {row_idx} column {col_idx} is not a number"
                ))
            })?;
            values.push(number as f32);
        }
    }

    let d = expected_cols.ok_or_else(|| CliError::invalid_input("points JSON has no rows"))?;
    let buffer = PointBuffer::new(values, rows.len(), d)?;
    Ok(match names {
        Some(names) => buffer.with_dimension_names(names),
        None => buffer,
    })
}

/// Accepts a bare cluster array or `{"clusters": [..]}`.
fn load_clusters(path: &Path) -> Result<Vec<Cluster>, CliError> {
    let value = read_json_value(path)?;
    let clusters = match value {
        Value::Object(mut map) => map.remove("clusters").ok_or_else(|| {
            CliError::invalid_input(format!(
                "cluster JSON '{}' must contain a 'clusters' array",
                path.display()
            ))
        })?,
        other => other,
    };
    serde_json::from_value(clusters).map_err(|source| {
        CliError::json(
            format!("invalid cluster partition in '{}'", path.display()),
            source,
        )
    })
}

fn load_config(path: &Path) -> Result<SyncConfig, CliError> {
    let wire: SyncConfigWire = serde_json::from_str(read_text(path)?.as_str()).map_err(|source| {
        CliError::json(format!("invalid sync config in '{}'", path.display()), source)
    })?;
    let (config, unknown) = wire.into_runtime_parts()?;
    if !unknown.is_empty() {
        warn!(
            fields = ?unknown.keys().collect::<Vec<_>>(),
            "ignoring unknown sync config fields"
        );
    }
    Ok(config)
}

fn load_selection(path: &Path, cluster_count: usize) -> Result<ExternalSelection, CliError> {
    let raw = read_text(path)?;
    parse_widget_selection(raw.as_str(), cluster_count).ok_or_else(|| {
        CliError::invalid_input(format!(
            "selection in '{}' is not an ordinal list, flag list or {{\"ordinals\"|\"flags\": [..]}} object",
            path.display()
        ))
    })
}

fn write_json_output<T: Serialize>(report: &T, output_path: Option<&Path>) -> Result<(), CliError> {
    let mut encoded = serde_json::to_string_pretty(report)
        .map_err(|source| CliError::json("could not encode report as JSON", source))?;
    encoded.push('\n');
    match output_path {
        Some(path) => fs::write(path, encoded).map_err(|source| {
            CliError::io(format!("could not write report to '{}'", path.display()), source)
        }),
        None => io::stdout()
            .lock()
            .write_all(encoded.as_bytes())
            .map_err(|source| CliError::io("could not write report to stdout", source)),
    }
}

fn error_envelope(err: &CliError) -> Value {
    json!({
        "error": {
            "code": err.code(),
            "message": err.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{
        CliError, Command, error_envelope, parse_cli, parse_csv_points, parse_json_points,
        parse_select_args, parse_stats_args,
    };
    use std::path::PathBuf;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|token| token.to_string()).collect()
    }

    #[test]
    fn csv_header_row_supplies_dimension_names() {
        let buffer = parse_csv_points("CD3, CD19\n1.0,10\n2.0,20\n").expect("csv should parse");
        assert_eq!(buffer.n(), 2);
        assert_eq!(buffer.d(), 2);
        assert_eq!(buffer.values(), &[1.0, 10.0, 2.0, 20.0]);
        assert_eq!(buffer.dimension_names(), &["CD3".to_string(), "CD19".to_string()]);
    }

    #[test]
    fn csv_without_header_has_no_names() {
        let buffer = parse_csv_points("1,2\n3,4\n").expect("csv should parse");
        assert!(buffer.dimension_names().is_empty());
    }

    #[test]
    fn csv_rejects_ragged_rows() {
        let err = parse_csv_points("1,2\n3\n").expect_err("ragged csv should fail");
        assert!(err.to_string().contains("columns"));
    }

    #[test]
    fn json_points_accept_both_shapes() {
        let bare = parse_json_points(&serde_json::json!([[1.0, 2.0], [3.0, 4.0]]))
            .expect("bare rows should parse");
        assert_eq!((bare.n(), bare.d()), (2, 2));

        let named = parse_json_points(&serde_json::json!({
            "values": [[1.0], [2.0], [3.0]],
            "dimension_names": ["x"]
        }))
        .expect("object form should parse");
        assert_eq!((named.n(), named.d()), (3, 1));
        assert_eq!(named.dimension_names(), &["x".to_string()]);
    }

    #[test]
    fn stats_args_collect_repeated_points() {
        let args = parse_stats_args(&tokens(&[
            "--points",
            "a.csv",
            "--points=b.csv",
            "--clusters",
            "c.json",
        ]))
        .expect("stats args should parse");
        assert_eq!(args.points, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
        assert_eq!(args.clusters, Some(PathBuf::from("c.json")));
    }

    #[test]
    fn stats_args_require_points_and_clusters() {
        let err = parse_stats_args(&tokens(&["--clusters", "c.json"]))
            .expect_err("missing points should fail");
        assert!(err.to_string().contains("--points"));
        let err = parse_stats_args(&tokens(&["--points", "a.csv"]))
            .expect_err("missing clusters should fail");
        assert!(err.to_string().contains("--clusters"));
    }

    #[test]
    fn select_args_reject_unknown_flags() {
        let err = parse_select_args(&tokens(&["--clusters", "c.json", "--bogus", "x"]))
            .expect_err("unknown flag should fail");
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn flag_without_path_is_rejected() {
        let err = parse_select_args(&tokens(&["--clusters", "--selection", "s.json"]))
            .expect_err("--clusters is missing its path");
        assert!(err.to_string().contains("found option '--selection'"));
        let err = parse_stats_args(&tokens(&["--points"])).expect_err("trailing flag");
        assert!(err.to_string().contains("--points expects a path"));
        let err = parse_stats_args(&tokens(&["a.csv"])).expect_err("positional argument");
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn error_envelope_carries_code_and_message() {
        let envelope = error_envelope(&CliError::invalid_input("stats requires --clusters"));
        assert_eq!(envelope["error"]["code"], "invalid_input");
        assert_eq!(
            envelope["error"]["message"],
            CliError::invalid_input("stats requires --clusters").to_string()
        );
    }

    #[test]
    fn verbosity_flags_are_stripped_before_dispatch() {
        let cli = parse_cli(&tokens(&[
            "-vv",
            "select",
            "--clusters",
            "c.json",
            "--selection",
            "s.json",
        ]))
        .expect("cli should parse")
        .expect("a command should be selected");
        assert_eq!(cli.verbosity, 2);
        assert!(matches!(cli.command, Command::Select(_)));
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = parse_cli(&tokens(&["detect"])).expect_err("unknown command should fail");
        assert!(err.to_string().contains("expected one of: stats, select"));
    }
}
