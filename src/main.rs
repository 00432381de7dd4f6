use chrono::Utc;
use clap::Parser;
use staleguard::cli::{Cli, ClientCommand, ClientFields, Command, NotifyArgs, ReportArgs, ScanArgs};
use staleguard::config::Config;
use staleguard::notify::{self, Notifier, OutboxNotifier};
use staleguard::reconcile::{self, Reconciler, ScanSettings, StaleEntry};
use staleguard::remote::LocalDrive;
use staleguard::store::{Client, ClientUpdate, Store};
use staleguard::util::format_timestamp;
use staleguard::{logging, report, Error, Result};

fn scan(config: &Config, store: &mut Store, args: &ScanArgs, verbose: bool) -> Result<()> {
    let root = args
        .drive_root
        .clone()
        .or_else(|| config.drive_root.clone())
        .ok_or_else(|| Error::Config("no drive root set; use --drive-root or [drive] root".into()))?;

    let drive = LocalDrive::connect(&root)?;
    let settings = ScanSettings::from_config(config)?;
    let scan_report = Reconciler::new(&drive, store, settings).run()?;

    if args.json {
        println!("{}", report::json::render(&scan_report)?);
    } else {
        let statuses = reconcile::get_all(store)?;
        report::print_statuses(&statuses, scan_report.scanned_at);
        report::print_scan_info(&scan_report, verbose);
    }

    Ok(())
}

fn show_report(store: &Store, args: &ReportArgs) -> Result<()> {
    let statuses = if args.outdated {
        reconcile::get_outdated(store)?
    } else {
        reconcile::get_all(store)?
    };

    if args.json {
        println!("{}", report::json::render(&statuses)?);
    } else {
        report::print_statuses(&statuses, Utc::now());
    }
    Ok(())
}

fn send_notification(config: &Config, store: &Store, args: &NotifyArgs) -> Result<()> {
    match store.latest_scan()? {
        Some(scan) => println!(
            "using results of scan #{} ({})",
            scan.id,
            format_timestamp(scan.finished_at)
        ),
        None => eprintln!("warning: no scan recorded yet, run 'staleguard scan' first"),
    }

    let entries: Vec<StaleEntry> = reconcile::get_outdated(store)?
        .iter()
        .map(StaleEntry::from)
        .collect();

    if args.dry_run {
        if entries.is_empty() {
            println!("No stale backups to notify.");
        } else {
            let message = notify::build(&config.notify, &entries)?;
            println!("To: {}", message.recipients.join(", "));
            println!("Subject: {}\n", message.subject);
            print!("{}", message.html);
        }
        return Ok(());
    }

    let outbox = OutboxNotifier::new(&config.notify.outbox);
    let notifier: &dyn Notifier = &outbox;
    if notify::notify_stale(notifier, &config.notify, &entries)? {
        println!(
            "Queued notification for {} stale clients in {}",
            entries.len(),
            config.notify.outbox.display()
        );
    } else {
        println!("No stale backups to notify.");
    }
    Ok(())
}

fn update_from_fields(fields: ClientFields) -> ClientUpdate {
    ClientUpdate {
        name: fields.name,
        ignored: None,
        freshness_window_days: fields.window_days.map(Some),
        emails: fields.emails,
        notes: fields.notes,
    }
}

fn print_client(client: &Client) {
    println!("id:        {}", client.id);
    println!("name:      {}", client.name);
    println!("ignored:   {}", if client.ignored { "yes" } else { "no" });
    match client.freshness_window_days {
        Some(days) => println!("window:    {days} days"),
        None => println!("window:    default"),
    }
    if !client.emails.is_empty() {
        println!("emails:    {}", client.emails.join(", "));
    }
    if let Some(notes) = &client.notes {
        println!("notes:     {notes}");
    }
}

fn manage_client(store: &mut Store, command: ClientCommand) -> Result<()> {
    match command {
        ClientCommand::List => {
            let clients = store.list_clients()?;
            if clients.is_empty() {
                println!("No clients registered. Run 'staleguard scan' to discover them.");
                return Ok(());
            }

            println!("{:<20} {:<30} {:<8} {:<8}", "ID", "Name", "Ignored", "Window");
            println!("{}", "-".repeat(70));
            for client in clients {
                let window = client
                    .freshness_window_days
                    .map(|d| format!("{d}d"))
                    .unwrap_or_else(|| "default".to_string());
                println!(
                    "{:<20} {:<30} {:<8} {:<8}",
                    client.id,
                    client.name,
                    if client.ignored { "yes" } else { "no" },
                    window
                );
            }
        }
        ClientCommand::Show { id } => {
            let client = store
                .get_client(&id)?
                .ok_or_else(|| Error::NotFound(format!("client '{id}'")))?;
            print_client(&client);

            match store.get_status(&id)? {
                Some(status) => {
                    let uploaded = status
                        .uploaded_at
                        .map(format_timestamp)
                        .unwrap_or_else(|| "-".to_string());
                    println!("latest:    {} ({}, {uploaded})", status.file_name, status.kind);
                    println!("current:   {}", if status.is_current { "yes" } else { "no" });
                }
                None => println!("latest:    not scanned yet"),
            }
        }
        ClientCommand::Add { id, fields, ignore } => {
            let mut client = Client::discovered(&id);
            let mut update = update_from_fields(fields);
            update.ignored = Some(ignore);
            update.apply(&mut client);

            store.create_client(&client)?;
            println!("Added client {id}");
        }
        ClientCommand::Update { id, fields, clear_window } => {
            let mut update = update_from_fields(fields);
            if clear_window {
                update.freshness_window_days = Some(None);
            }

            match store.update_client(&id, &update)? {
                Some(client) => print_client(&client),
                None => return Err(Error::NotFound(format!("client '{id}'"))),
            }
        }
        ClientCommand::Ignore { id } => {
            if !store.set_ignored(&id, true)? {
                return Err(Error::NotFound(format!("client '{id}'")));
            }
            println!("Client {id} is now ignored");
        }
        ClientCommand::Unignore { id } => {
            if !store.set_ignored(&id, false)? {
                return Err(Error::NotFound(format!("client '{id}'")));
            }
            println!("Client {id} is no longer ignored");
        }
        ClientCommand::Remove { id } => {
            if !store.delete_client(&id)? {
                return Err(Error::NotFound(format!("client '{id}'")));
            }
            println!("Removed client {id}");
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli)?;
    let _log_guard = logging::init(cli.verbose, config.log_dir.as_deref())?;

    let mut store = Store::open(&config.database)?;
    let verbose = cli.verbose > 0;

    match cli.command {
        Command::Scan(args) => scan(&config, &mut store, &args, verbose),
        Command::Report(args) => show_report(&store, &args),
        Command::Notify(args) => send_notification(&config, &store, &args),
        Command::Client(command) => manage_client(&mut store, command),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
