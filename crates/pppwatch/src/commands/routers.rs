//! Router command handlers.

use secrecy::SecretString;
use tabled::Tabled;

use pppwatch_core::{
    ConnectionProbe, Monitor, NewRouter, Router, RouterUpdate, SyncOutcome, TelegramTarget,
};

use crate::cli::{AddRouterArgs, GlobalOpts, RoutersArgs, RoutersCommand, UpdateRouterArgs};
use crate::error::CliError;
use crate::output::{self, Painter};

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct RouterRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Sync")]
    sync: String,
    #[tabled(rename = "Quarantine")]
    quarantine: String,
    #[tabled(rename = "Reports")]
    reports: String,
    #[tabled(rename = "Last sync")]
    last_sync: String,
}

fn router_row(r: &Router, paint: Painter) -> RouterRow {
    RouterRow {
        id: r.id.to_string(),
        name: r.name.clone(),
        address: address(r),
        sync: if r.active {
            paint.good("active")
        } else {
            paint.muted("paused")
        },
        quarantine: output::or_dash(r.quarantine_profile()),
        reports: (if r.has_telegram() { "telegram" } else { "-" }).to_owned(),
        last_sync: output::timestamp(r.last_sync),
    }
}

fn address(r: &Router) -> String {
    let scheme = if r.use_tls { "https" } else { "http" };
    format!("{scheme}://{}:{}", r.host, r.port)
}

fn router_detail(r: &Router, paint: Painter) -> String {
    output::detail(&[
        ("ID", r.id.to_string()),
        ("Name", r.name.clone()),
        ("Address", address(r)),
        ("Username", r.username.clone()),
        (
            "Sync",
            if r.active {
                paint.good("active")
            } else {
                paint.muted("paused")
            },
        ),
        ("Quarantine", output::or_dash(r.quarantine_profile())),
        (
            "Reports",
            r.telegram
                .as_ref()
                .map_or_else(|| "-".into(), |t| format!("telegram chat {}", t.chat_id)),
        ),
        ("Last sync", output::timestamp(r.last_sync)),
        ("Created", output::timestamp(Some(r.created_at))),
    ])
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
}

fn probe_detail(p: &ConnectionProbe, paint: Painter) -> String {
    let mut pairs = vec![(
        "Status",
        if p.connected {
            paint.good("connected")
        } else {
            paint.bad("unreachable")
        },
    )];
    if let Some(ref identity) = p.identity {
        pairs.push(("Identity", identity.clone()));
    }
    if let Some(ref error) = p.error {
        pairs.push(("Error", error.clone()));
    }
    output::detail(&pairs)
}

fn sync_detail(s: &SyncOutcome, paint: Painter) -> String {
    let names = |names: &[String]| {
        if names.is_empty() {
            "-".to_owned()
        } else {
            names.join(", ")
        }
    };
    output::detail(&[
        ("Router", s.router_id.to_string()),
        ("Identity", s.identity.clone()),
        ("Subscribers", s.subscribers.to_string()),
        ("Online", paint.good(&s.online.to_string())),
        ("Logins", names(&s.logins)),
        ("Logouts", names(&s.logouts)),
        ("Deleted", names(&s.deleted)),
    ])
}

// ── Request builders ────────────────────────────────────────────────

fn new_router(args: AddRouterArgs) -> Result<NewRouter, CliError> {
    let password = util::password_or_prompt(args.password, "Router API password: ")?;
    if args.telegram_token.is_some() != args.telegram_chat.is_some() {
        return Err(CliError::Validation {
            field: "telegram".into(),
            reason: "--telegram-token and --telegram-chat go together".into(),
        });
    }
    Ok(NewRouter {
        name: args.name,
        host: args.host,
        port: args.port,
        username: args.username,
        password,
        use_tls: !args.no_tls,
        active: Some(!args.inactive),
        quarantine_profile: args.quarantine_profile,
        telegram_bot_token: args.telegram_token.map(SecretString::from),
        telegram_chat_id: args.telegram_chat,
    })
}

fn router_update(args: UpdateRouterArgs) -> Result<RouterUpdate, CliError> {
    let password = if args.password {
        Some(util::password_or_prompt(None, "New router API password: ")?)
    } else {
        None
    };

    let quarantine_profile = if args.clear_quarantine_profile {
        Some(None)
    } else {
        args.quarantine_profile.map(Some)
    };

    let telegram = if args.clear_telegram {
        Some(None)
    } else {
        match (args.telegram_token, args.telegram_chat) {
            (Some(token), Some(chat_id)) => Some(Some(TelegramTarget {
                bot_token: SecretString::from(token),
                chat_id,
            })),
            _ => None,
        }
    };

    Ok(RouterUpdate {
        name: args.name,
        host: args.host,
        port: args.port,
        username: args.username,
        password,
        use_tls: args.tls,
        active: args.active,
        quarantine_profile,
        telegram,
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    monitor: &Monitor,
    args: RoutersArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let paint = Painter::new(&global.color);

    match args.command {
        RoutersCommand::List => {
            let routers = monitor.list_routers().await?;
            let out = output::render_list(
                &global.output,
                &routers,
                |r| router_row(r, paint),
                |r| r.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RoutersCommand::Show { router } => {
            let router = monitor.router(router).await?;
            let out = output::render_single(
                &global.output,
                &router,
                |r| router_detail(r, paint),
                |r| r.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RoutersCommand::Add(add) => {
            let router = monitor.add_router(new_router(add)?).await?;
            let out = output::render_single(
                &global.output,
                &router,
                |r| router_detail(r, paint),
                |r| r.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            if !global.quiet {
                eprintln!("Router added");
            }
            Ok(())
        }

        RoutersCommand::Update(update) => {
            let id = update.router;
            let router = monitor.update_router(id, router_update(update)?).await?;
            let out = output::render_single(
                &global.output,
                &router,
                |r| router_detail(r, paint),
                |r| r.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RoutersCommand::Remove { router } => {
            let router = monitor.router(router).await?;
            if !util::confirm(
                "routers remove",
                &format!(
                    "Remove router '{}' and its stored subscribers? Usage history is kept.",
                    router.name
                ),
                global.yes,
            )? {
                return Ok(());
            }
            monitor.remove_router(router.id).await?;
            if !global.quiet {
                eprintln!("Router removed");
            }
            Ok(())
        }

        RoutersCommand::Test { router } => {
            let stored = monitor.router(router).await?;
            let probe = monitor.test_connection(router).await?;
            let out = output::render_single(
                &global.output,
                &probe,
                |p| probe_detail(p, paint),
                |p| p.connected.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            match probe.error {
                Some(reason) if !probe.connected => Err(CliError::ConnectionFailed {
                    host: stored.host,
                    reason,
                }),
                _ => Ok(()),
            }
        }

        RoutersCommand::Sync { router } => {
            let outcome = monitor.sync_now(router).await?;
            let out = output::render_single(
                &global.output,
                &outcome,
                |s| sync_detail(s, paint),
                |s| s.identity.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RoutersCommand::Profiles { router } => {
            let profiles = monitor.list_profiles(router).await?;
            let out = output::render_list(
                &global.output,
                &profiles,
                |p| ProfileRow { name: p.clone() },
                Clone::clone,
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
