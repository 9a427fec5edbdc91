use marshal_core::intercept::InterceptOutcome;
use owo_colors::{OwoColorize, Stream};

/// Print one intercepted invocation: the tool's own output verbatim,
/// then any coordination sections on stderr so they never pollute
/// piped tool output.
pub fn render(outcome: &InterceptOutcome) {
    if let Some(run) = &outcome.run {
        print!("{}", run.stdout);
        eprint!("{}", run.stderr);
    }

    let mut sections = Sections::default();

    if let Some(rejection) = &outcome.rejection {
        sections.ensure_header();
        eprintln!(
            "{} {}",
            "blocked:".if_supports_color(Stream::Stderr, |text| text.red()),
            rejection.reason
        );
        for item in &rejection.in_flight {
            eprintln!(
                "  {} {} ({} / {})",
                item.bead_id.if_supports_color(Stream::Stderr, |text| text.bold()),
                item.title,
                item.alias,
                item.human_name
            );
        }
        eprintln!("  re-run with --:jump-in \"<message>\" to take over");
    }

    if let Some(reconcile) = &outcome.reconcile {
        for conflict in &reconcile.conflicts {
            sections.ensure_header();
            eprintln!(
                "{} {} is reserved by {} (retry in ~{}s)",
                "conflict:".if_supports_color(Stream::Stderr, |text| text.yellow()),
                conflict.path,
                conflict.holder,
                conflict.retry_after_secs
            );
        }
    }

    for related in &outcome.related {
        sections.ensure_header();
        eprintln!(
            "{} {} is working on {} ({}); consider reaching out",
            "related:".if_supports_color(Stream::Stderr, |text| text.cyan()),
            related.alias,
            related.bead_id,
            related.relation
        );
    }

    for item in &outcome.notified {
        sections.ensure_header();
        eprintln!("notified {} about the takeover", item.alias);
    }

    for warning in &outcome.warnings {
        sections.ensure_header();
        warn(warning);
    }
}

pub fn warn(message: &str) {
    eprintln!(
        "{} {message}",
        "warn:".if_supports_color(Stream::Stderr, |text| text.yellow())
    );
}

/// One blank separator line before the first coordination section,
/// printed at most once per invocation.
#[derive(Default)]
struct Sections {
    header_printed: bool,
}

impl Sections {
    fn ensure_header(&mut self) {
        if !self.header_printed {
            eprintln!();
            self.header_printed = true;
        }
    }
}
