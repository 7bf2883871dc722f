// ==========================================
// 混凝土站核心 - 质量数据 Repository 集成测试
// ==========================================
// 覆盖: 订单日期过滤、送货单窗口、嵌套装配、端到端渐进加载
// ==========================================


use chrono::NaiveDate;
use concrete_plant::app::AppState;
use concrete_plant::config::config_keys;
use concrete_plant::domain::quality::QualityQuery;
use concrete_plant::domain::types::SliceOrder;
use concrete_plant::engine::LoadOutcome;
use concrete_plant::repository::{QualityRepository, QualityRepositoryImpl};
use tempfile::NamedTempFile;
use test_helpers::*;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// 客户 c1: 订单 o1/o2 在五月，o3 在六月；c2 的订单不应出现
fn setup() -> (NamedTempFile, String) {
    concrete_plant::logging::init_test();
    let (temp, db_path) = create_test_db().expect("创建测试数据库失败");
    let shared = open_shared(&db_path);
    let conn = shared.lock().unwrap();

    seed_client(&conn, "c1", Some("ACM"), "Acme");
    seed_client(&conn, "c2", Some("OTR"), "Otro");
    seed_recipe(&conn, "r1", "P1", "FC250", None);

    seed_order(&conn, "o1", "c1", "Site A", "2024-05-01");
    seed_order(&conn, "o2", "c1", "Site B", "2024-05-31");
    seed_order(&conn, "o3", "c1", "Site A", "2024-06-01");
    seed_order(&conn, "o-c2", "c2", "Lejos", "2024-05-10");

    seed_remision(&conn, "rem1", "P1", "100", "2024-05-06", Some("o1"), Some("r1"), Some(8.0));
    seed_remision(&conn, "rem2", "P1", "101", "2024-05-12", Some("o1"), None, Some(7.0));
    seed_remision(&conn, "rem-null", "P1", "102", "2024-05-07", Some("o1"), Some("r1"), None);
    seed_remision(&conn, "rem-late", "P1", "103", "2024-05-13", Some("o1"), Some("r1"), Some(5.0));
    seed_remision(&conn, "rem-c2", "P1", "104", "2024-05-08", Some("o-c2"), Some("r1"), Some(5.0));

    seed_muestreo(&conn, "m1", "rem1", "2024-05-06", Some(2400.0));
    seed_muestra(&conn, "s1", "m1");
    seed_ensayo(&conn, "e1", "s1", Some(250.0), Some(100.0), true, false);
    seed_ensayo(&conn, "e2", "s1", Some(200.0), Some(80.0), false, false);
    seed_remision_material(&conn, "mat1", "rem1", "CEMENTO", 10000.0);
    seed_remision_material(&conn, "mat2", "rem1", "GRAVA", 9200.0);

    drop(conn);
    (temp, db_path)
}

#[tokio::test]
async fn test_order_ids_respect_inclusive_delivery_range() {
    let (_temp, db_path) = setup();
    let repo = QualityRepositoryImpl::new(&db_path).unwrap();

    let mut ids = repo
        .find_order_ids_for_client("c1", d(2024, 5, 1), d(2024, 5, 31))
        .await
        .unwrap();
    ids.sort();
    assert_eq!(ids, vec!["o1".to_string(), "o2".to_string()]);

    let none = repo
        .find_order_ids_for_client("nadie", d(2024, 5, 1), d(2024, 5, 31))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_window_excludes_null_volume_and_out_of_range() {
    let (_temp, db_path) = setup();
    let repo = QualityRepositoryImpl::new(&db_path).unwrap();
    let orders = vec!["o1".to_string()];

    let records = repo
        .find_remisiones_in_window(&orders, d(2024, 5, 6), d(2024, 5, 12))
        .await
        .unwrap();

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["rem2", "rem1"]);
    assert_eq!(records[0].recipe_code, None);
    assert_eq!(records[1].recipe_code.as_deref(), Some("FC250"));
    assert_eq!(records[1].client_id.as_deref(), Some("c1"));
    assert_eq!(records[1].construction_site.as_deref(), Some("Site A"));

    let empty = repo
        .find_remisiones_in_window(&[], d(2024, 5, 1), d(2024, 5, 31))
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_nested_quality_data_is_assembled() {
    let (_temp, db_path) = setup();
    let repo = QualityRepositoryImpl::new(&db_path).unwrap();

    let records = repo
        .find_remisiones_in_window(&["o1".to_string()], d(2024, 5, 6), d(2024, 5, 6))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);

    let rem1 = &records[0];
    assert_eq!(rem1.muestreos.len(), 1);
    assert_eq!(rem1.muestreos[0].masa_unitaria, Some(2400.0));
    assert_eq!(rem1.muestreos[0].muestras.len(), 1);

    let ensayos = &rem1.muestreos[0].muestras[0].ensayos;
    assert_eq!(ensayos.len(), 2);
    assert_eq!(ensayos.iter().filter(|e| e.is_qualifying()).count(), 1);
    assert_eq!(rem1.materiales.len(), 2);
}

#[tokio::test]
async fn test_end_to_end_progressive_load() {
    let (_temp, db_path) = setup();
    let state = AppState::new(db_path).unwrap();
    state
        .config_manager
        .set_global_config_value(config_keys::ORDER_CHUNK_SIZE, "1")
        .unwrap();
    state
        .config_manager
        .set_global_config_value(config_keys::SLICE_ORDER, "OLDEST_FIRST")
        .unwrap();

    let loader = state.quality_loader().await.unwrap();
    assert_eq!(loader.settings().order_chunk_size, 1);
    assert_eq!(loader.settings().slice_order, SliceOrder::OldestFirst);

    let outcome = loader
        .load(QualityQuery {
            client_id: "c1".to_string(),
            from: d(2024, 5, 1),
            to: d(2024, 5, 31),
            order: loader.settings().slice_order,
        })
        .await
        .unwrap();
    let LoadOutcome::Completed(result) = outcome else {
        panic!("加载不应被取代");
    };

    assert!(result.error.is_none());
    let data = result.data.unwrap();
    let summary = result.summary.unwrap();

    let ids: Vec<&str> = data.remisiones.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["rem-late", "rem2", "rem1"]);
    assert_eq!(summary.totals.remisiones, 3);
    assert!((summary.totals.volume - 20.0).abs() < 1e-9);
    assert_eq!(summary.totals.remisiones_muestreadas, 1);
    assert_eq!(summary.totals.ensayos_validos, 1);
    assert!((summary.averages.compliance - 100.0).abs() < 1e-9);
    assert!((summary.averages.resistencia - 250.0).abs() < 1e-9);
    assert!((summary.averages.rendimiento_volumetrico - 100.0).abs() < 1e-9);

    let recipe_keys: Vec<&str> = data.by_recipe.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(recipe_keys, vec!["FC250", "N/A"]);
}
