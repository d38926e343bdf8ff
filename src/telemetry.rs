use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use std::fmt::{self as stdfmt};
use tracing::field::{Field, Visit};
use tracing::Event;
use tracing::Subscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::{
    self as fmt_subscriber, format::Writer, FmtContext, FormatEvent, FormatFields,
    FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

const SERVICE_NAME: &str = "orchestrate";
const DEFAULT_FILTER: &str = "orchestrate=info,info";

/// Installs the global subscriber: key=value lines, INFO and below on stdout,
/// WARN and above on stderr. `RUST_LOG` overrides the default filter.
pub fn init_tracing() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stdout = std::io::stdout;
    let stderr = std::io::stderr;

    let writer = stderr
        .with_max_level(tracing::Level::WARN)
        .or_else(stdout);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(false)
        .with_ansi(false)
        .event_format(KeyValueFormatter::new())
        .fmt_fields(fmt_subscriber::format::DefaultFields::new())
        .with_writer(writer)
        .try_init()
        .map_err(|err| crate::err!("failed to initialise tracing subscriber: {err}"))
}

struct KeyValueFormatter {
    service_name: &'static str,
}

impl KeyValueFormatter {
    const fn new() -> Self {
        Self {
            service_name: SERVICE_NAME,
        }
    }
}

impl<S, N> FormatEvent<S, N> for KeyValueFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let metadata = event.metadata();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());

        let mut fields = visitor.fields;
        fields.sort_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));

        let mut line = String::new();
        push_field(
            &mut line,
            "ts",
            &Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        push_field(&mut line, "level", metadata.level().as_str());
        push_field(&mut line, "service", self.service_name);
        push_field(&mut line, "component", metadata.target());

        if let Some(scope) = current_scope(ctx) {
            push_field(&mut line, "span", &scope.path);
            if !scope.fields.is_empty() {
                line.push(' ');
                line.push_str(&scope.fields);
            }
        }

        push_field(&mut line, "msg", &message);
        for (key, value) in fields {
            push_field(&mut line, &key, &value);
        }

        writer.write_str(&line)?;
        writer.write_char('\n')
    }
}

struct SpanScope {
    path: String,
    /// Already formatted `key=value` fields of every span in scope, root first.
    fields: String,
}

fn current_scope<S, N>(ctx: &FmtContext<'_, S, N>) -> Option<SpanScope>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    let span = ctx.lookup_current()?;
    let mut names = Vec::new();
    let mut fields = Vec::new();
    for span in span.scope().from_root() {
        names.push(span.name());
        let extensions = span.extensions();
        if let Some(formatted) = extensions.get::<FormattedFields<N>>() {
            if !formatted.is_empty() {
                fields.push(formatted.to_string());
            }
        }
    }
    Some(SpanScope {
        path: names.join("."),
        fields: fields.join(" "),
    })
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn record_field(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_field(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        self.record_field(field, format!("{value:?}"));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_field(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_field(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_field(field, value.to_string());
    }
}

fn encode_field_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\\' | '=' | '[' | ']' | '{' | '}'));

    if !needs_quotes {
        return value.to_string();
    }

    let mut encoded = String::with_capacity(value.len() + 2);
    encoded.push('"');
    for ch in value.chars() {
        match ch {
            '"' => encoded.push_str("\\\""),
            '\\' => encoded.push_str("\\\\"),
            '\n' => encoded.push_str("\\n"),
            '\r' => encoded.push_str("\\r"),
            '\t' => encoded.push_str("\\t"),
            _ => encoded.push(ch),
        }
    }
    encoded.push('"');
    encoded
}

fn push_field(buffer: &mut String, key: &str, value: &str) {
    if !buffer.is_empty() {
        buffer.push(' ');
    }
    buffer.push_str(key);
    buffer.push('=');
    buffer.push_str(&encode_field_value(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_stay_bare() {
        assert_eq!(encode_field_value("topic-tx-sender"), "topic-tx-sender");
        assert_eq!(encode_field_value("08000@handler.producer"), "08000@handler.producer");
    }

    #[test]
    fn values_with_separators_are_quoted_and_escaped() {
        assert_eq!(encode_field_value(""), "\"\"");
        assert_eq!(encode_field_value("a b"), "\"a b\"");
        assert_eq!(
            encode_field_value("say \"hi\"\n"),
            "\"say \\\"hi\\\"\\n\""
        );
    }

    #[test]
    fn fields_are_space_separated() {
        let mut line = String::new();
        push_field(&mut line, "event", "offset_marked");
        push_field(&mut line, "error", "invalid chainID - got x");
        assert_eq!(line, "event=offset_marked error=\"invalid chainID - got x\"");
    }
}
