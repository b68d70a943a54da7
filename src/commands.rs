use std::io::Write;

use anyhow::{bail, Context};

use threadline_core::models::*;
use threadline_core::session::spawn_elapsed_ticker;
use threadline_core::{Config, Database, Engine, Filter, Preferences};

use crate::{Commands, ObjectiveCommand, PersonaCommand, ProblemCommand, SessionCommand, ThreadCommand};

pub type AppEngine = Engine<Database>;

/// Open the configured database, load the graph and make sure the local
/// user exists.
pub async fn open_engine(config: &Config) -> anyhow::Result<AppEngine> {
    let db = match &config.database_path {
        Some(path) => Database::open(path)?,
        None => Database::open_default()?,
    };
    db.migrate()?;

    let mut engine = Engine::new(db);
    engine.load_all().await?;
    engine.ensure_user(&config.user_name).await?;
    Ok(engine)
}

pub async fn run(mut engine: AppEngine, config: &Config, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Persona(cmd) => persona(&mut engine, cmd).await,
        Commands::Objective(cmd) => objective(&mut engine, cmd).await,
        Commands::Problem(cmd) => problem(&mut engine, cmd).await,
        Commands::Thread(cmd) => thread(&mut engine, cmd).await,
        Commands::Session(cmd) => session(&mut engine, config, cmd).await,
        Commands::Select {
            persona,
            objective,
            clear,
        } => select(&engine, persona, objective, clear),
        Commands::Mcp => crate::mcp::run_stdio_server(engine).await,
    }
}

async fn persona(engine: &mut AppEngine, cmd: PersonaCommand) -> anyhow::Result<()> {
    match cmd {
        PersonaCommand::List => {
            for p in engine.all::<Persona>().iter() {
                println!("{}  {}  ({} problems)", p.id, p.name, p.problem_ids.len());
            }
        }
        PersonaCommand::Add {
            name,
            description,
            order,
        } => {
            let mut persona = Persona::new(engine.author_id(), name).with_order(order);
            persona.description = description;
            let persona = engine.add(persona).await?;
            println!("{}", persona.id);
        }
        PersonaCommand::Rename { id, name } => {
            engine.update_with::<Persona, _>(&id, |p| p.name = name).await?;
        }
        PersonaCommand::Remove { id } => {
            let removed = engine.delete::<Persona>(&id).await?;
            println!("Removed {} entities", removed);
        }
    }
    Ok(())
}

async fn objective(engine: &mut AppEngine, cmd: ObjectiveCommand) -> anyhow::Result<()> {
    match cmd {
        ObjectiveCommand::List => {
            for o in engine.all::<Objective>().iter() {
                println!("{}  {}", o.id, o.title);
                for gap_id in &o.gap_ids {
                    if let Some(gap) = engine.get::<Gap>(gap_id) {
                        println!("    gap {}  {} -> {}", gap.id, gap.current_state, gap.ideal_state);
                    }
                }
            }
        }
        ObjectiveCommand::Add { title, order } => {
            let objective = engine
                .add(Objective::new(engine.author_id(), title).with_order(order))
                .await?;
            println!("{}", objective.id);
        }
        ObjectiveCommand::Gap {
            objective_id,
            ideal,
            current,
        } => {
            if engine.get::<Objective>(&objective_id).is_none() {
                bail!("Objective not found: {}", objective_id);
            }
            let gap = engine.add(Gap::new(objective_id, ideal, current)).await?;
            println!("{}", gap.id);
        }
        ObjectiveCommand::Remove { id } => {
            let removed = engine.delete::<Objective>(&id).await?;
            println!("Removed {} entities", removed);
        }
    }
    Ok(())
}

fn problem_partition(persona: Option<String>, objective: Option<String>) -> anyhow::Result<Filter> {
    let prefs = load_preferences()?;
    let filter = match (persona, objective) {
        (Some(id), _) => Filter::eq("persona_id", id),
        (None, Some(id)) => Filter::eq("objective_id", id),
        (None, None) => match (prefs.selected_persona_id, prefs.selected_objective_id) {
            (Some(id), _) => Filter::eq("persona_id", id),
            (None, Some(id)) => Filter::eq("objective_id", id),
            (None, None) => Filter::All,
        },
    };
    Ok(filter)
}

async fn problem(engine: &mut AppEngine, cmd: ProblemCommand) -> anyhow::Result<()> {
    match cmd {
        ProblemCommand::List { persona, objective } => {
            let filter = problem_partition(persona, objective)?;
            engine.fetch::<Problem>(filter.clone()).await?;
            for p in engine.all::<Problem>().iter() {
                if !filter.matches(&p.to_record()?) {
                    continue;
                }
                let status = if p.is_resolved { "resolved" } else { "open" };
                println!("{}  [{}] {}  ({} threads)", p.id, status, p.title, p.child_thread_ids.len());
            }
        }
        ProblemCommand::Add {
            title,
            persona,
            objective,
            gap,
            parent,
        } => {
            let mut problem = Problem::new(title);
            problem.persona_id = persona;
            problem.objective_id = objective;
            problem.gap_id = gap;
            problem.parent_id = parent;
            let problem = engine.add(problem).await?;
            println!("{}", problem.id);
        }
        ProblemCommand::Remove { id } => {
            let removed = engine.delete::<Problem>(&id).await?;
            println!("Removed {} entities", removed);
        }
    }
    Ok(())
}

fn parse_type(s: &str) -> anyhow::Result<ThreadType> {
    ThreadType::from_str(s).with_context(|| format!("Unknown thread type: {}", s))
}

fn print_thread(engine: &AppEngine, item: &ThreadItem, depth: usize) {
    let marker = match &item.kind {
        ThreadKind::Task { is_completed: true } => "[x] ".to_string(),
        ThreadKind::Task { is_completed: false } => "[ ] ".to_string(),
        ThreadKind::Bottleneck { is_resolved: true } => "(resolved) ".to_string(),
        ThreadKind::Action { status, .. } => format!("({}) ", status.as_str()),
        ThreadKind::Session { time_spent, .. } => format!("{} ", format_elapsed(*time_spent)),
        _ => String::new(),
    };
    println!(
        "{}{}  {} {}{}",
        "  ".repeat(depth),
        item.id,
        item.thread_type().as_str(),
        marker,
        item.content
    );
    for child_id in &item.child_thread_ids {
        if let Some(child) = engine.get::<ThreadItem>(child_id) {
            print_thread(engine, child, depth + 1);
        }
    }
}

async fn thread(engine: &mut AppEngine, cmd: ThreadCommand) -> anyhow::Result<()> {
    match cmd {
        ThreadCommand::List { problem_id } => {
            engine
                .fetch::<ThreadItem>(Filter::eq("problem_id", problem_id.as_str()))
                .await?;
            let Some(problem) = engine.get::<Problem>(&problem_id) else {
                bail!("Problem not found: {}", problem_id);
            };
            for item_id in &problem.child_thread_ids {
                if let Some(item) = engine.get::<ThreadItem>(item_id) {
                    print_thread(engine, item, 0);
                }
            }
        }
        ThreadCommand::Add {
            problem_id,
            content,
            ty,
            reply_to,
        } => {
            let mut item = ThreadItem::new(problem_id, parse_type(&ty)?, content);
            item.parent_id = reply_to;
            let item = engine.add(item).await?;
            println!("{}", item.id);
        }
        ThreadCommand::Retype { id, ty } => {
            let item = engine.change_thread_type(&id, parse_type(&ty)?).await?;
            println!("{} is now {}", item.id, item.thread_type().as_str());
        }
        ThreadCommand::Done { id } => {
            let Some(item) = engine.get::<ThreadItem>(&id) else {
                bail!("Thread item not found: {}", id);
            };
            match item.thread_type() {
                ThreadType::Action => {
                    engine.complete_action(&id).await?;
                }
                ThreadType::Bottleneck => {
                    engine.resolve_bottleneck(&id).await?;
                }
                ThreadType::Task => {
                    engine
                        .update_with::<ThreadItem, _>(&id, |item| {
                            if let ThreadKind::Task { is_completed } = &mut item.kind {
                                *is_completed = !*is_completed;
                            }
                        })
                        .await?;
                }
                other => bail!("{} items cannot be completed", other.as_str()),
            }
        }
        ThreadCommand::Remove { id } => {
            let removed = engine.delete::<ThreadItem>(&id).await?;
            println!("Removed {} entities", removed);
        }
    }
    Ok(())
}

pub fn format_elapsed(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

async fn session(engine: &mut AppEngine, config: &Config, cmd: SessionCommand) -> anyhow::Result<()> {
    match cmd {
        SessionCommand::Start { thread_id } => {
            engine.start_session(&thread_id).await?;
            println!("Session started on {}", thread_id);
        }
        SessionCommand::Pause => {
            engine.pause_session().await?;
            println!("Paused at {}", format_elapsed(engine.session_elapsed()));
        }
        SessionCommand::Resume => {
            engine.resume_session().await?;
            println!("Resumed at {}", format_elapsed(engine.session_elapsed()));
        }
        SessionCommand::Stop => {
            let item = engine.stop_session().await?;
            println!("{}  {}", item.id, item.content);
        }
        SessionCommand::Status => match engine.active_session() {
            Some(active) => println!(
                "{} on {}  {}",
                engine.session().phase(),
                active.thread_id,
                format_elapsed(engine.session_elapsed())
            ),
            None => match engine.most_recent_session() {
                Some(last) => println!("idle, last: {} at {}", last.content, last.created_at),
                None => println!("idle"),
            },
        },
        SessionCommand::Watch => {
            if !engine.session().is_active() {
                bail!("No active session");
            }
            let ticker = spawn_elapsed_ticker(engine.subscribe_session(), engine.clock(), config.tick_interval());
            let mut elapsed = ticker.subscribe();
            loop {
                print!("\r{}", format_elapsed(*elapsed.borrow_and_update()));
                std::io::stdout().flush()?;
                tokio::select! {
                    changed = elapsed.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            println!();
        }
    }
    Ok(())
}

fn load_preferences() -> anyhow::Result<Preferences> {
    match Preferences::default_path() {
        Some(path) => Ok(Preferences::load(&path)?),
        None => Ok(Preferences::default()),
    }
}

fn select(
    engine: &AppEngine,
    persona: Option<String>,
    objective: Option<String>,
    clear: bool,
) -> anyhow::Result<()> {
    let path = Preferences::default_path().context("No config directory on this platform")?;
    let mut prefs = if clear {
        Preferences::default()
    } else {
        Preferences::load(&path)?
    };
    if persona.is_some() {
        prefs.selected_persona_id = persona;
    }
    if objective.is_some() {
        prefs.selected_objective_id = objective;
    }

    let persona_exists = prefs
        .selected_persona_id
        .as_deref()
        .map_or(true, |id| engine.get::<Persona>(id).is_some());
    let objective_exists = prefs
        .selected_objective_id
        .as_deref()
        .map_or(true, |id| engine.get::<Objective>(id).is_some());
    prefs.retain_existing(persona_exists, objective_exists);

    prefs.save(&path)?;
    println!(
        "persona: {}  objective: {}",
        prefs.selected_persona_id.as_deref().unwrap_or("-"),
        prefs.selected_objective_id.as_deref().unwrap_or("-")
    );
    Ok(())
}
