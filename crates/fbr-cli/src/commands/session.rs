//! Session lifecycle handlers: suggest, start, complete, cancel, show, list, stale.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use fbr_config::EngineConfig;
use fbr_schemas::{DistributionSession, ResolvedIngredient, SessionStatus};
use fbr_session::{DistributionService, StartSession};
use uuid::Uuid;

use super::{load_recipe_file, open_service, print_warnings};
use crate::SessionCmd;

pub async fn dispatch(cfg: &EngineConfig, cmd: SessionCmd) -> Result<()> {
    let svc = open_service(cfg).await?;
    match cmd {
        SessionCmd::Suggest { food_bank, recipe } => suggest(&svc, &food_bank, &recipe).await,
        SessionCmd::Start {
            food_bank,
            recipe,
            recipe_id,
            initial_meal_count,
        } => start(&svc, &food_bank, &recipe, recipe_id, initial_meal_count).await,
        SessionCmd::Complete {
            session_id,
            final_meal_count,
        } => complete(&svc, &session_id, final_meal_count).await,
        SessionCmd::Cancel { session_id } => {
            let out = svc.cancel(parse_session_id(&session_id)?).await?;
            print_warnings(&out.warnings);
            println!("cancelled=true session_id={} status={}", out.session.id, out.session.status);
            Ok(())
        }
        SessionCmd::Show { session_id } => {
            let s = svc.get(parse_session_id(&session_id)?).await?;
            print_session(&s);
            Ok(())
        }
        SessionCmd::List { food_bank, status } => list(&svc, &food_bank, status.as_deref()).await,
        SessionCmd::Stale { food_bank } => {
            let stale = svc.stale_sessions(&food_bank, Utc::now()).await?;
            for s in &stale {
                println!(
                    "stale session_id={} recipe_id={} started_at_utc={} age_hours={}",
                    s.session_id,
                    s.recipe_id,
                    s.started_at.to_rfc3339(),
                    s.age_hours
                );
            }
            println!("stale_sessions={}", stale.len());
            Ok(())
        }
    }
}

/// `fbr resolve`: resolution plus availability, no session.
pub async fn resolve(cfg: &EngineConfig, food_bank: &str, recipe_path: &str) -> Result<()> {
    let svc = open_service(cfg).await?;
    resolve_and_report(&svc, food_bank, recipe_path).await?;
    Ok(())
}

async fn resolve_and_report(
    svc: &DistributionService,
    food_bank: &str,
    recipe_path: &str,
) -> Result<(fbr_schemas::Recipe, Vec<ResolvedIngredient>)> {
    let (recipe, _rejected) = load_recipe_file(recipe_path)?;
    let resolved = svc.resolve(food_bank, &recipe.ingredients).await?;

    for r in &resolved {
        println!(
            "ingredient name={:?} item_id={} score={}",
            r.ingredient.product_name,
            r.inventory_item_id.as_deref().unwrap_or("-"),
            r.match_score.map(|s| format!("{s:.2}")).unwrap_or_else(|| "-".to_string())
        );
    }
    let bound = resolved.iter().filter(|r| r.is_bound()).count();
    println!("resolved={}/{} threshold={}", bound, resolved.len(), svc.resolver().threshold());

    for w in svc.availability(food_bank, &resolved).await? {
        eprintln!(
            "WARN: low_stock product={:?} item_id={} available={} needed={}",
            w.product_name, w.inventory_item_id, w.available, w.needed
        );
    }

    Ok((recipe, resolved))
}

async fn suggest(svc: &DistributionService, food_bank: &str, recipe_path: &str) -> Result<()> {
    let (recipe, resolved) = resolve_and_report(svc, food_bank, recipe_path).await?;
    let n = svc.suggest(food_bank, &resolved, &recipe.servings).await?;
    println!("planned_servings={:?}", recipe.servings);
    println!("suggested_initial_count={}", n);
    if n == 0 {
        eprintln!("WARN: no bound ingredient stock; enter the initial count manually");
    }
    Ok(())
}

async fn start(
    svc: &DistributionService,
    food_bank: &str,
    recipe_path: &str,
    recipe_id: Option<String>,
    initial_meal_count: i64,
) -> Result<()> {
    let (recipe, resolved) = resolve_and_report(svc, food_bank, recipe_path).await?;
    let recipe_id = match recipe_id.or_else(|| recipe.id.clone()) {
        Some(id) => id,
        None => bail!("recipe id missing: pass --recipe-id or set \"id\" in the recipe file"),
    };

    let out = svc
        .start(StartSession {
            food_bank_id: food_bank.to_string(),
            recipe_id,
            recipe_name: recipe.name,
            planned_servings: recipe.servings,
            initial_meal_count,
            ingredients: resolved,
        })
        .await?;
    print_warnings(&out.warnings);

    let s = &out.session;
    println!("session_id={}", s.id);
    println!("status={}", s.status);
    println!("recipe_id={}", s.recipe_id);
    println!("initial_meal_count={}", s.initial_meal_count);
    println!(
        "bound_ingredients={}/{}",
        s.ingredient_usage.iter().filter(|u| u.inventory_item_id.is_some()).count(),
        s.ingredient_usage.len()
    );
    Ok(())
}

async fn complete(svc: &DistributionService, session_id: &str, final_meal_count: i64) -> Result<()> {
    let out = svc.complete(parse_session_id(session_id)?, final_meal_count).await?;
    print_warnings(&out.warnings);

    for d in &out.deductions {
        println!(
            "deducted item_id={} amount={} before={} after={} variance={}",
            d.inventory_item_id, d.deducted, d.quantity_before, d.quantity_after, d.variance
        );
    }
    println!("session_id={}", out.session.id);
    println!("status={}", out.session.status);
    println!("distributed_meal_count={}", out.session.distributed_meal_count.unwrap_or(0));
    println!("usage_ratio={:.4}", out.usage_ratio);
    println!("has_variance={}", out.has_variance);
    println!("attempts={}", out.attempts);
    Ok(())
}

async fn list(svc: &DistributionService, food_bank: &str, status: Option<&str>) -> Result<()> {
    let status = match status {
        Some(s) => Some(
            SessionStatus::parse(s)
                .with_context(|| format!("invalid --status '{}'. expected one of: active | completed | cancelled", s))?,
        ),
        None => None,
    };
    let sessions = svc.list(food_bank, status).await?;
    for s in &sessions {
        println!(
            "session_id={} status={} recipe_id={} initial={} final={} started_at_utc={}",
            s.id,
            s.status,
            s.recipe_id,
            s.initial_meal_count,
            opt_i64(s.final_meal_count),
            s.started_at.to_rfc3339()
        );
    }
    println!("sessions={}", sessions.len());
    Ok(())
}

fn print_session(s: &DistributionSession) {
    println!("session_id={}", s.id);
    println!("food_bank_id={}", s.food_bank_id);
    println!("recipe_id={}", s.recipe_id);
    println!("recipe_name={}", s.recipe_name);
    println!("planned_servings={}", s.planned_servings);
    println!("status={}", s.status);
    println!("initial_meal_count={}", s.initial_meal_count);
    println!("final_meal_count={}", opt_i64(s.final_meal_count));
    println!("distributed_meal_count={}", opt_i64(s.distributed_meal_count));
    println!("has_variance={}", s.has_variance);
    println!("started_at_utc={}", s.started_at.to_rfc3339());
    println!("completed_at_utc={}", opt_dt(&s.completed_at));
    println!("cancelled_at_utc={}", opt_dt(&s.cancelled_at));
    for u in &s.ingredient_usage {
        println!(
            "usage product={:?} item_id={} expected={} actual={} deducted={} variance={} variance_pct={:.1}",
            u.product_name,
            u.inventory_item_id.as_deref().unwrap_or("-"),
            u.expected_quantity,
            opt_i64(u.actual_quantity),
            u.deducted_quantity,
            u.variance,
            u.variance_percentage
        );
    }
}

fn parse_session_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).context("invalid session_id uuid")
}

fn opt_i64(v: Option<i64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

fn opt_dt(dt: &Option<chrono::DateTime<Utc>>) -> String {
    dt.as_ref().map(|d| d.to_rfc3339()).unwrap_or_default()
}

