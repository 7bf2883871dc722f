// ==========================================
// 混凝土站核心 - 命令行入口
// ==========================================
// 用法:
//   concrete-plant validate <plant_id> <rows.json>
//   concrete-plant quality <client_id> <from> <to> [oldest|newest]
//   concrete-plant config [key value]
// 数据库: CONCRETE_PLANT_DB_PATH 或用户数据目录
// ==========================================

use anyhow::{bail, Context};
use chrono::NaiveDate;
use concrete_plant::app::{get_default_db_path, AppState};
use concrete_plant::domain::quality::QualityQuery;
use concrete_plant::domain::types::SliceOrder;
use concrete_plant::engine::LoadOutcome;
use concrete_plant::importer::{parse_staging_rows, BatchValidator};
use std::path::Path;

const USAGE: &str = "用法:
  concrete-plant validate <plant_id> <rows.json>
  concrete-plant quality <client_id> <from YYYY-MM-DD> <to YYYY-MM-DD> [oldest|newest]
  concrete-plant config [key value]";

fn parse_date(value: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("日期格式错误（应为 YYYY-MM-DD）: {}", value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    concrete_plant::logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    let db_path = get_default_db_path();
    tracing::info!("{} v{}，数据库: {}", concrete_plant::APP_NAME, concrete_plant::VERSION, db_path);
    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;

    match (command.as_str(), &args[1..]) {
        ("validate", [plant_id, rows_path]) => {
            let rows = parse_staging_rows(Path::new(rows_path))?;
            let report = state.arkik_validator(plant_id).validate_and_report(rows).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ("quality", [client_id, from, to, rest @ ..]) if rest.len() <= 1 => {
            let loader = state.quality_loader().await?;
            let order = match rest.first() {
                Some(order) => SliceOrder::from_str(order),
                None => loader.settings().slice_order,
            };
            let query = QualityQuery {
                client_id: client_id.clone(),
                from: parse_date(from)?,
                to: parse_date(to)?,
                order,
            };

            let mut rx = loader.subscribe();
            let progress = tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let snapshot = rx.borrow_and_update().clone();
                    tracing::info!(
                        processed = snapshot.progress.processed,
                        total = snapshot.progress.total,
                        streaming = snapshot.streaming,
                        "质量数据进度"
                    );
                }
            });

            let outcome = loader.load(query).await?;
            drop(loader);
            let _ = progress.await;

            match outcome {
                LoadOutcome::Completed(final_state) => {
                    println!("{}", serde_json::to_string_pretty(&final_state)?);
                }
                LoadOutcome::Superseded => bail!("加载被取代"),
            }
        }
        ("config", []) => {
            println!("{}", state.config_manager.get_config_snapshot()?);
        }
        ("config", [key, value]) => {
            state.config_manager.set_global_config_value(key, value)?;
            println!("{} = {}", key, value);
        }
        _ => {
            eprintln!("{}", USAGE);
            bail!("参数错误: {:?}", args);
        }
    }

    Ok(())
}
