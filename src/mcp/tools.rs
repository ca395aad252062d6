//! The tools this server exposes.
//!
//! Handlers receive arguments already checked against their declared
//! parameters, so they only apply the range checks that depend on
//! configuration (`max_batch_size`, `max_depth_limit`).

use serde_json::{json, Value};

use crate::error::ToolError;
use crate::mcp::context::ServerContext;
use crate::mcp::registry::{ParamKind, ParamSpec, Tool};
use crate::scan::{EntryFilter, EntryType, SortKey, SortOrder, SortSpec};
use crate::session::SessionState;

const DIRECTORY: ParamSpec = ParamSpec::required(
    "directory",
    ParamKind::String,
    "Directory to enumerate. Must lie inside an allowed path.",
);
const BATCH_SIZE: ParamSpec = ParamSpec::optional(
    "batch_size",
    ParamKind::Integer { min: 1 },
    "Entries per batch (defaults to the configured batch size).",
);
const MAX_DEPTH: ParamSpec = ParamSpec::optional(
    "max_depth",
    ParamKind::Integer { min: 1 },
    "Deepest level walked; 1 lists immediate children only.",
);
const INCLUDE_HIDDEN: ParamSpec = ParamSpec::optional(
    "include_hidden",
    ParamKind::Boolean,
    "Include dot-prefixed entries and descend hidden directories.",
);
const EXTENSIONS: ParamSpec = ParamSpec::optional(
    "extensions",
    ParamKind::StringArray,
    "Only report files with one of these extensions (case-insensitive).",
);
const PATTERN: ParamSpec = ParamSpec::optional(
    "pattern",
    ParamKind::String,
    "Glob matched against entry names, e.g. '*.rs'.",
);
const ENTRY_TYPE: ParamSpec = ParamSpec::optional(
    "entry_type",
    ParamKind::Enum(EntryType::NAMES),
    "Kinds of entry to report.",
);
const USE_CACHE: ParamSpec = ParamSpec::optional(
    "use_cache",
    ParamKind::Boolean,
    "Set false to force a fresh scan (the result still refreshes the cache).",
);
const SESSION_ID: ParamSpec = ParamSpec::required(
    "session_id",
    ParamKind::String,
    "Id returned by start_stream.",
);

/// Declares every builtin tool.
#[must_use]
pub fn builtin_tools() -> Vec<Tool> {
    vec![
        Tool::new(
            "list_directory",
            "List a directory tree one batch at a time. Entries are filtered, sorted, and \
             sliced by offset; follow next_offset until it is absent to read the whole listing.",
            vec![
                DIRECTORY,
                ParamSpec::optional(
                    "offset",
                    ParamKind::Integer { min: 0 },
                    "Index of the first entry to return (default 0).",
                ),
                BATCH_SIZE,
                MAX_DEPTH,
                INCLUDE_HIDDEN,
                EXTENSIONS,
                PATTERN,
                ENTRY_TYPE,
                ParamSpec::optional(
                    "sort_by",
                    ParamKind::Enum(SortKey::NAMES),
                    "Field to sort by (default name).",
                ),
                ParamSpec::optional(
                    "sort_order",
                    ParamKind::Enum(SortOrder::NAMES),
                    "Sort direction (default asc).",
                ),
                USE_CACHE,
            ],
            list_directory,
        ),
        Tool::new(
            "pagination_plan",
            "Report how a listing splits into batches: total entries, total batches, and \
             every valid offset for the given batch size.",
            vec![
                DIRECTORY,
                BATCH_SIZE,
                MAX_DEPTH,
                INCLUDE_HIDDEN,
                EXTENSIONS,
                PATTERN,
                ENTRY_TYPE,
                USE_CACHE,
            ],
            pagination_plan,
        ),
        Tool::new(
            "start_stream",
            "Start enumerating a directory tree across several calls. Returns a session id \
             and the first batch in walk order.",
            vec![
                DIRECTORY,
                BATCH_SIZE,
                MAX_DEPTH,
                INCLUDE_HIDDEN,
                EXTENSIONS,
                PATTERN,
                ENTRY_TYPE,
            ],
            start_stream,
        ),
        Tool::new(
            "next_stream",
            "Return the next batch of a stream. An exhausted stream returns an empty batch \
             with complete=true.",
            vec![SESSION_ID],
            next_stream,
        ),
        Tool::new(
            "stop_stream",
            "Stop a stream and free its session.",
            vec![SESSION_ID],
            stop_stream,
        ),
        Tool::new(
            "list_streams",
            "List live stream sessions.",
            Vec::new(),
            list_streams,
        ),
        Tool::new(
            "server_status",
            "Report server health, uptime, usage totals, cache statistics, and live sessions.",
            Vec::new(),
            server_status,
        ),
        Tool::new(
            "code_metrics",
            "Count lines and estimate branch complexity of a source file.",
            vec![ParamSpec::required(
                "path",
                ParamKind::String,
                "Source file to analyse. Must lie inside an allowed path.",
            )],
            code_metrics,
        ),
    ]
}

fn string_arg<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

fn required_string<'a>(args: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    string_arg(args, name).ok_or_else(|| ToolError::validation(name, "missing required parameter"))
}

fn usize_arg(args: &Value, name: &str) -> Result<Option<usize>, ToolError> {
    args.get(name)
        .and_then(Value::as_u64)
        .map(|n| usize::try_from(n).map_err(|_| ToolError::validation(name, "value too large")))
        .transpose()
}

fn bool_arg(args: &Value, name: &str, default: bool) -> bool {
    args.get(name).and_then(Value::as_bool).unwrap_or(default)
}

fn enum_arg<T>(args: &Value, name: &str) -> Result<Option<T>, ToolError>
where
    T: std::str::FromStr<Err = String>,
{
    string_arg(args, name)
        .map(|s| s.parse().map_err(|e: String| ToolError::validation(name, e)))
        .transpose()
}

fn batch_size(ctx: &ServerContext, args: &Value) -> Result<usize, ToolError> {
    let config = ctx.scan_config();
    let size = usize_arg(args, "batch_size")?.unwrap_or(config.default_batch_size);
    if size == 0 || size > config.max_batch_size {
        return Err(ToolError::validation(
            "batch_size",
            format!("must be between 1 and {}", config.max_batch_size),
        ));
    }
    Ok(size)
}

/// Builds and checks the filter shared by listings, plans, and streams.
fn entry_filter(ctx: &ServerContext, args: &Value) -> Result<EntryFilter, ToolError> {
    let config = ctx.scan_config();
    let max_depth = usize_arg(args, "max_depth")?.unwrap_or(config.default_max_depth);
    if max_depth == 0 || max_depth > config.max_depth_limit {
        return Err(ToolError::validation(
            "max_depth",
            format!("must be between 1 and {}", config.max_depth_limit),
        ));
    }

    let extensions: Vec<&str> = args
        .get("extensions")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let filter = EntryFilter::new(max_depth)
        .with_hidden(bool_arg(args, "include_hidden", false))
        .with_extensions(extensions)
        .with_pattern(string_arg(args, "pattern").map(str::to_string))
        .with_entry_type(enum_arg(args, "entry_type")?.unwrap_or_default());

    filter.compile()?;
    Ok(filter)
}

fn list_directory(ctx: &mut ServerContext, args: &Value) -> Result<Value, ToolError> {
    let directory = required_string(args, "directory")?;
    let offset = usize_arg(args, "offset")?.unwrap_or(0);
    let limit = batch_size(ctx, args)?;
    let filter = entry_filter(ctx, args)?;
    let sort = SortSpec::new(
        enum_arg(args, "sort_by")?.unwrap_or_default(),
        enum_arg(args, "sort_order")?.unwrap_or_default(),
    );
    let root = ctx.resolve_directory(directory)?;

    let (listing, cache) = ctx.listing(&root, &filter, sort, bool_arg(args, "use_cache", true))?;
    let batch = listing.page(offset, limit);

    tracing::debug!(
        directory = %root.display(),
        offset,
        returned = batch.entries.len(),
        total = batch.total,
        cache = cache.as_str(),
        "Listed directory"
    );
    ctx.record_usage("entries_listed", batch.entries.len() as u64);

    Ok(json!({
        "status": "success",
        "directory": root.display().to_string(),
        "sort_by": sort.key.as_str(),
        "sort_order": sort.order.as_str(),
        "cache": cache.as_str(),
        "batch": batch.to_json(),
    }))
}

fn pagination_plan(ctx: &mut ServerContext, args: &Value) -> Result<Value, ToolError> {
    let directory = required_string(args, "directory")?;
    let size = batch_size(ctx, args)?;
    let filter = entry_filter(ctx, args)?;
    let root = ctx.resolve_directory(directory)?;

    let (plan, listing) = ctx.plan(&root, &filter, size, bool_arg(args, "use_cache", true))?;

    let mut result = json!({
        "status": "success",
        "directory": root.display().to_string(),
        "total_entries": plan.total_entries,
        "batch_size": plan.batch_size,
        "total_batches": plan.total_batches,
        "offsets": plan.offsets,
        "partial": listing.partial(),
    });
    if let Some(reason) = listing.stop {
        result["stop_reason"] = json!(reason.as_str());
    }
    Ok(result)
}

fn stream_result(batch: &crate::session::StreamBatch) -> Value {
    json!({
        "status": "success",
        "session_id": batch.session_id,
        "state": batch.state.as_str(),
        "batch": batch.to_json(),
    })
}

fn start_stream(ctx: &mut ServerContext, args: &Value) -> Result<Value, ToolError> {
    let directory = required_string(args, "directory")?;
    let size = batch_size(ctx, args)?;
    let filter = entry_filter(ctx, args)?;
    let root = ctx.resolve_directory(directory)?;

    let batch = ctx.start_stream(root, filter, size)?;
    ctx.record_usage("entries_streamed", batch.entries.len() as u64);
    Ok(stream_result(&batch))
}

fn next_stream(ctx: &mut ServerContext, args: &Value) -> Result<Value, ToolError> {
    let session_id = required_string(args, "session_id")?;
    let batch = ctx.next_stream(session_id)?;
    ctx.record_usage("entries_streamed", batch.entries.len() as u64);
    Ok(stream_result(&batch))
}

fn stop_stream(ctx: &mut ServerContext, args: &Value) -> Result<Value, ToolError> {
    let session_id = required_string(args, "session_id")?;
    let stopped = ctx.stop_stream(session_id)?;
    Ok(json!({
        "status": "success",
        "session_id": stopped.session_id,
        "state": SessionState::Stopped.as_str(),
        "previous_state": stopped.previous_state.as_str(),
        "entries_emitted": stopped.entries_emitted,
    }))
}

fn list_streams(ctx: &mut ServerContext, _args: &Value) -> Result<Value, ToolError> {
    let sessions = ctx.stream_summaries();
    Ok(json!({
        "status": "success",
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

fn server_status(ctx: &mut ServerContext, _args: &Value) -> Result<Value, ToolError> {
    Ok(json!({
        "status": "success",
        "server": ctx.status(),
    }))
}

fn code_metrics(ctx: &mut ServerContext, args: &Value) -> Result<Value, ToolError> {
    let requested = required_string(args, "path")?;
    let path = ctx.resolve_file(requested)?;
    let report = ctx.analyze(&path)?;
    Ok(json!({
        "status": "success",
        "path": path.display().to_string(),
        "lines": report.lines,
        "complexity": report.complexity,
    }))
}
