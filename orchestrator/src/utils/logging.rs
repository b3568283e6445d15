use chrono::Utc;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Level, Subscriber};
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::{LookupSpan, SpanRef};
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Fields promoted to their own console column, looked up on the event first and then on its spans.
const JOB_FIELD: &str = "job_id";
const STEP_FIELD: &str = "step";

/// Crate targets and the short label shown for them.
const SERVICES: &[(&str, &str)] = &[
    ("anchor_ethereum_submitter", "ETHEREUM"),
    ("anchor_substrate_submitter", "SUBSTRATE"),
    ("anchor_submitter_client_interface", "SUBMITTER"),
    ("anchor_orchestrator", "-"),
];

/// Fields recorded on a span, stored in its extensions.
#[derive(Debug, Clone, Default)]
pub struct SpanFields(pub Map<String, Value>);

/// Collects typed field values. `message` is kept apart when `split_message` is set.
#[derive(Default)]
struct FieldVisitor {
    split_message: bool,
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn for_event() -> Self {
        Self { split_message: true, ..Self::default() }
    }

    fn put(&mut self, field: &Field, value: Value) {
        if self.split_message && field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}").trim_matches('"').to_string()));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::from(value));
    }
}

/// Keeps span fields readable by the formatters below.
pub struct SpanFieldLayer;

impl<S> Layer<S> for SpanFieldLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.fields));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        let previous = extensions.remove::<SpanFields>().unwrap_or_default();
        let mut visitor = FieldVisitor { fields: previous.0, ..FieldVisitor::default() };
        values.record(&mut visitor);
        extensions.insert(SpanFields(visitor.fields));
    }
}

/// Event fields followed by the fields of every enclosing span, innermost first. Event fields win.
fn collect_fields<S, N>(ctx: &FmtContext<'_, S, N>, event: &Event<'_>) -> (Option<String>, Map<String, Value>)
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    let mut visitor = FieldVisitor::for_event();
    event.record(&mut visitor);
    let mut fields = visitor.fields;

    if let Some(scope) = ctx.event_scope() {
        for span in scope {
            merge_span_fields(&span, &mut fields);
        }
    }
    (visitor.message, fields)
}

fn merge_span_fields<'a, R: LookupSpan<'a>>(span: &SpanRef<'a, R>, fields: &mut Map<String, Value>) {
    if let Some(span_fields) = span.extensions().get::<SpanFields>() {
        for (key, value) in &span_fields.0 {
            fields.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

/// Console layout: `time | level | job | step | service | message (fields)`
pub struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        const DIM: &str = "\x1b[90m";
        const COLUMN: &str = "\x1b[92m";
        const RESET: &str = "\x1b[0m";

        let level = *event.metadata().level();
        let level_color = match level {
            Level::ERROR => "\x1b[31m",
            Level::WARN => "\x1b[33m",
            Level::INFO => "\x1b[32m",
            Level::DEBUG => "\x1b[34m",
            Level::TRACE => DIM,
        };

        let (message, mut fields) = collect_fields(ctx, event);
        let job = take_column(&mut fields, JOB_FIELD).map(|id| short_job_id(&id)).unwrap_or_else(|| "-".to_string());
        let step = take_column(&mut fields, STEP_FIELD).unwrap_or_else(|| "-".to_string());
        let separator = format!("{DIM}|{RESET}");

        write!(writer, "\x1b[96m{}{RESET} {separator} ", Utc::now().format("%y-%m-%d %H:%M:%S"))?;
        write!(writer, "{level_color}{level:<5}{RESET} {separator} ")?;
        write!(writer, "{COLUMN}{job:<10}{RESET} {separator} {COLUMN}{step:<24}{RESET} {separator} ")?;
        write!(writer, "{COLUMN}{:<9}{RESET} {separator} ", service_name(event.metadata().target()))?;
        write!(writer, "\x1b[97m{}{RESET}", message.unwrap_or_default())?;

        if !fields.is_empty() {
            let rendered = fields
                .iter()
                .map(|(name, value)| match value {
                    Value::String(s) => format!("{name}={s}"),
                    other => format!("{name}={other}"),
                })
                .collect::<Vec<_>>()
                .join(", ");
            write!(writer, " {DIM}({rendered}){RESET}")?;
        }

        writeln!(writer)
    }
}

/// One JSON object per line.
pub struct JsonFormatter;

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();
        let (message, fields) = collect_fields(ctx, event);

        let mut line = Map::new();
        line.insert("timestamp".into(), Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true).into());
        line.insert("level".into(), meta.level().as_str().into());
        line.insert("target".into(), meta.target().into());
        line.insert("service".into(), service_name(meta.target()).into());
        if let (Some(file), Some(number)) = (meta.file(), meta.line()) {
            line.insert("location".into(), format!("{file}:{number}").into());
        }
        line.insert("message".into(), message.unwrap_or_default().into());
        if let Some(span) = ctx.lookup_current() {
            line.insert("span".into(), span.metadata().name().into());
        }
        if !fields.is_empty() {
            line.insert("fields".into(), Value::Object(fields));
        }

        let rendered = serde_json::to_string(&line).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{rendered}")
    }
}

/// Installs `color_eyre` and the global subscriber.
///
/// `RUST_LOG` drives the filter (default `anchor_orchestrator=info`). `LOG_FORMAT=json` switches
/// from the console layout to one JSON object per line.
pub fn init_logging() {
    color_eyre::install().expect("Unable to install color_eyre");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(Level::INFO.into())
            .parse("anchor_orchestrator=info")
            .expect("Invalid filter directive and Logger control")
    });
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = Registry::default().with(env_filter).with(SpanFieldLayer).with(ErrorLayer::default());
    let result = if json {
        tracing::subscriber::set_global_default(registry.with(fmt::layer().event_format(JsonFormatter)))
    } else {
        tracing::subscriber::set_global_default(registry.with(fmt::layer().event_format(ConsoleFormatter)))
    };
    result.expect("Failed to set global default subscriber");
}

fn service_name(target: &str) -> &'static str {
    SERVICES.iter().find(|(prefix, _)| target.starts_with(prefix)).map(|(_, name)| *name).unwrap_or("EXTERNAL")
}

fn take_column(fields: &mut Map<String, Value>, name: &str) -> Option<String> {
    match fields.remove(name)? {
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// First bytes of a job id, enough to tell jobs apart on a console.
fn short_job_id(id: &str) -> String {
    id.chars().take(10).collect()
}
