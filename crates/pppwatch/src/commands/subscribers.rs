//! Subscriber command handlers.

use tabled::Tabled;

use pppwatch_core::{
    Counters, GeoPoint, IsolationAction, IsolationOutcome, Monitor, NewSubscriber, RouterId,
    SubscriberStatus, SubscriberUsage, UsageSummary,
};

use crate::cli::{GlobalOpts, SubscribersArgs, SubscribersCommand};
use crate::error::CliError;
use crate::output::{self, Painter};

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct SubscriberRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Profile")]
    profile: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Uptime")]
    uptime: String,
    #[tabled(rename = "Rate tx/rx")]
    rate: String,
    #[tabled(rename = "Session tx/rx")]
    current: String,
    #[tabled(rename = "Total tx/rx")]
    total: String,
    #[tabled(rename = "Comment")]
    comment: String,
}

fn status_word(s: &SubscriberStatus, paint: Painter) -> String {
    if s.is_isolated() {
        paint.bad("isolated")
    } else if s.disabled {
        paint.muted("disabled")
    } else {
        paint.online(s.is_online)
    }
}

fn subscriber_row(s: &SubscriberStatus, paint: Painter) -> SubscriberRow {
    SubscriberRow {
        name: s.name.clone(),
        profile: s.profile.clone(),
        status: status_word(s, paint),
        address: output::or_dash(s.address.as_deref()),
        uptime: output::or_dash(s.uptime.as_deref()),
        rate: if s.rate.is_zero() {
            "-".into()
        } else {
            format!(
                "{} / {}",
                output::bitrate(s.rate.tx),
                output::bitrate(s.rate.rx)
            )
        },
        current: output::traffic(s.current),
        total: output::traffic(s.total),
        comment: output::or_dash(s.comment.as_deref()),
    }
}

#[derive(Tabled)]
struct UsageRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Session tx/rx")]
    current: String,
    #[tabled(rename = "Stored tx/rx")]
    accumulated: String,
    #[tabled(rename = "Total tx/rx")]
    total: String,
    #[tabled(rename = "Last online")]
    last_seen: String,
    #[tabled(rename = "Recent sessions")]
    recent: String,
}

fn usage_row(u: &SubscriberUsage, paint: Painter) -> UsageRow {
    let recent: Counters = u
        .recent_sessions
        .iter()
        .fold(Counters::ZERO, |sum, r| sum + r.bytes);
    UsageRow {
        name: u.summary.name.clone(),
        status: paint.online(u.summary.is_online),
        current: output::traffic(u.summary.current),
        accumulated: output::traffic(u.summary.accumulated),
        total: output::traffic(u.summary.total),
        last_seen: output::timestamp(u.summary.last_seen_online),
        recent: if u.recent_sessions.is_empty() {
            "-".into()
        } else {
            format!(
                "{} ({})",
                u.recent_sessions.len(),
                output::traffic(recent)
            )
        },
    }
}

fn summary_detail(u: &UsageSummary, paint: Painter) -> String {
    output::detail(&[
        ("Name", u.name.clone()),
        ("Status", paint.online(u.is_online)),
        ("Session tx/rx", output::traffic(u.current)),
        ("Stored tx/rx", output::traffic(u.accumulated)),
        ("Total tx/rx", output::traffic(u.total)),
        ("Last online", output::timestamp(u.last_seen_online)),
    ])
}

fn isolation_detail(o: &IsolationOutcome, paint: Painter) -> String {
    let action = match o.action {
        IsolationAction::Isolated => paint.bad("isolated"),
        IsolationAction::Restored => paint.good("restored"),
    };
    output::detail(&[
        ("Subscriber", o.name.clone()),
        ("Action", action),
        (
            "Profile",
            format!("{} -> {}", o.previous_profile, o.profile),
        ),
        ("Sessions dropped", o.sessions_removed.to_string()),
    ])
}

// ── Filters ─────────────────────────────────────────────────────────

struct ListFilter {
    online: bool,
    offline: bool,
    isolated: bool,
}

impl ListFilter {
    fn keep(&self, s: &SubscriberStatus) -> bool {
        (!self.online || s.is_online)
            && (!self.offline || !s.is_online)
            && (!self.isolated || s.is_isolated())
    }
}

fn location(
    latitude: Option<f64>,
    longitude: Option<f64>,
    clear: bool,
) -> Result<Option<GeoPoint>, CliError> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) if !clear => Ok(Some(GeoPoint::new(lat, lon)?)),
        (None, None) if clear => Ok(None),
        _ => Err(CliError::Validation {
            field: "location".into(),
            reason: "pass --latitude and --longitude, or --clear".into(),
        }),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    monitor: &Monitor,
    args: SubscribersArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let paint = Painter::new(&global.color);

    match args.command {
        SubscribersCommand::List {
            router,
            online,
            offline,
            isolated,
        } => {
            let filter = ListFilter {
                online,
                offline,
                isolated,
            };
            let mut subscribers = monitor.list_subscribers(router).await?;
            subscribers.retain(|s| filter.keep(s));
            let out = output::render_list(
                &global.output,
                &subscribers,
                |s| subscriber_row(s, paint),
                |s| s.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SubscribersCommand::Comment {
            router,
            name,
            comment,
        } => {
            monitor.set_comment(router, &name, &comment).await?;
            if !global.quiet {
                if comment.trim().is_empty() {
                    eprintln!("Comment cleared");
                } else {
                    eprintln!("Comment updated");
                }
            }
            Ok(())
        }

        SubscribersCommand::Locate {
            router,
            name,
            latitude,
            longitude,
            clear,
        } => {
            let point = location(latitude, longitude, clear)?;
            monitor.set_location(router, &name, point).await?;
            if !global.quiet {
                eprintln!("Location {}", if clear { "cleared" } else { "saved" });
            }
            Ok(())
        }

        SubscribersCommand::Isolate {
            router,
            name,
            restore_to,
        } => {
            let outcome = monitor
                .toggle_isolation(router, &name, restore_to.as_deref())
                .await?;
            let out = output::render_single(
                &global.output,
                &outcome,
                |o| isolation_detail(o, paint),
                |o| o.action.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SubscribersCommand::Create {
            router,
            name,
            profile,
            service,
            comment,
            password,
        } => {
            let password = util::password_or_prompt(password, "Secret password: ")?;
            let subscriber = NewSubscriber {
                name,
                password,
                profile,
                service,
                comment,
            };
            monitor.create_subscriber(router, &subscriber).await?;
            if !global.quiet {
                eprintln!(
                    "Subscriber '{}' created ({})",
                    subscriber.name,
                    subscriber.service()
                );
            }
            Ok(())
        }

        SubscribersCommand::Usage { router, name } => {
            usage(monitor, router, name.as_deref(), global, paint).await
        }
    }
}

async fn usage(
    monitor: &Monitor,
    router: RouterId,
    name: Option<&str>,
    global: &GlobalOpts,
    paint: Painter,
) -> Result<(), CliError> {
    let out = if let Some(name) = name {
        let summary = monitor.usage_summary(router, name).await?;
        output::render_single(
            &global.output,
            &summary,
            |u| summary_detail(u, paint),
            |u| u.total.tx.saturating_add(u.total.rx).to_string(),
        )?
    } else {
        let usage = monitor.router_usage(router).await?;
        output::render_list(
            &global.output,
            &usage,
            |u| usage_row(u, paint),
            |u| u.summary.name.clone(),
        )?
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_needs_both_coordinates_or_clear() {
        assert!(matches!(location(Some(-6.2), Some(106.8), false), Ok(Some(_))));
        assert!(matches!(location(None, None, true), Ok(None)));
        assert!(location(Some(-6.2), None, false).is_err());
        assert!(location(None, None, false).is_err());
    }

    #[test]
    fn out_of_range_latitude_is_rejected() {
        assert!(matches!(
            location(Some(91.0), Some(0.0), false),
            Err(CliError::Validation { .. })
        ));
    }
}
