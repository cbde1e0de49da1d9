//! The export run: for each brand, query every season, add raw and summary
//! sheets, and save the brand's workbook.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::{Instrument, info, info_span, warn};

use crate::catalog::{Brand, Season, unique_seasons};
use crate::fetch::HttpClient;
use crate::query::QueryMode;
use crate::summary::summarize;
use crate::table::Cell;
use crate::warehouse::{SnowflakeSession, Warehouse};
use crate::workbook::BrandWorkbook;

/// What to export and where.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub brands: Vec<Brand>,
    pub seasons: Vec<Season>,
    pub mode: QueryMode,
    pub output_dir: PathBuf,
    /// Run stamp shared by every file name, `YYYYMMDD_HHMMSS`.
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonReport {
    pub season: String,
    pub raw_rows: usize,
    pub summary_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandReport {
    pub brand: Brand,
    /// `None` when no season had data and nothing was written.
    pub path: Option<PathBuf>,
    pub seasons: Vec<SeasonReport>,
}

pub fn output_file_name(brand_code: &str, timestamp: &str) -> String {
    format!("dcst_raw_data_{brand_code}_{timestamp}.xlsx")
}

pub fn raw_sheet_name(season: &Season) -> String {
    format!("{}_RAW", season.code)
}

pub fn summary_sheet_name(season: &Season) -> String {
    format!("{}_SUMMARY", season.code)
}

/// Runs the whole plan sequentially. The first failure aborts the run.
///
/// A season listed twice is exported once.
pub async fn run_export<W: Warehouse + ?Sized>(
    warehouse: &W,
    plan: &ExportPlan,
) -> Result<Vec<BrandReport>> {
    let seasons = unique_seasons(&plan.seasons);
    if seasons.len() < plan.seasons.len() {
        warn!(
            requested = plan.seasons.len(),
            unique = seasons.len(),
            "Repeated seasons ignored"
        );
    }

    fs::create_dir_all(&plan.output_dir).with_context(|| {
        format!("Cannot create output directory {}", plan.output_dir.display())
    })?;

    let mut reports = Vec::with_capacity(plan.brands.len());
    for brand in &plan.brands {
        let span = info_span!("brand", code = brand.code, name = brand.name);
        let report = export_brand(warehouse, plan, &seasons, brand)
            .instrument(span)
            .await?;
        reports.push(report);
    }
    Ok(reports)
}

/// Runs the plan on `session`, then ends the session whether or not the run
/// succeeded. A failed logout is logged and does not change the result.
pub async fn run_export_and_close<C: HttpClient>(
    session: SnowflakeSession<C>,
    plan: &ExportPlan,
) -> Result<Vec<BrandReport>> {
    let result = run_export(&session, plan).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close Snowflake session");
    }
    result
}

async fn export_brand<W: Warehouse + ?Sized>(
    warehouse: &W,
    plan: &ExportPlan,
    seasons: &[Season],
    brand: &Brand,
) -> Result<BrandReport> {
    info!("Exporting brand");

    let mut workbook = BrandWorkbook::new();
    let mut reports = Vec::new();

    for season in seasons {
        info!(
            season = %season,
            from = %season.current_season_start,
            to = %season.period_end,
            "Querying season"
        );

        let statement = plan.mode.statement(brand, season);
        let raw = warehouse
            .query(&statement)
            .await
            .with_context(|| format!("Query failed for brand {} season {}", brand.code, season))?
            .with_constant_column(plan.mode.season_column(), Cell::Text(season.code.clone()));

        if raw.is_empty() {
            info!(season = %season, "No data for season");
            continue;
        }

        let summary = summarize(&raw, plan.mode.group_by())
            .with_context(|| format!("Cannot summarize brand {} season {}", brand.code, season))?;

        workbook.add_table(&raw_sheet_name(season), &raw)?;
        workbook.add_table(&summary_sheet_name(season), &summary)?;
        info!(
            season = %season,
            raw_rows = raw.len(),
            summary_rows = summary.len(),
            "Season sheets added"
        );

        reports.push(SeasonReport {
            season: season.code.clone(),
            raw_rows: raw.len(),
            summary_rows: summary.len(),
        });
    }

    if workbook.is_empty() {
        warn!("No data for any season, no workbook written");
        return Ok(BrandReport {
            brand: *brand,
            path: None,
            seasons: reports,
        });
    }

    let path = plan
        .output_dir
        .join(output_file_name(brand.code, &plan.timestamp));
    workbook.save(&path)?;
    info!(path = %path.display(), sheets = reports.len() * 2, "Workbook written");

    Ok(BrandReport {
        brand: *brand,
        path: Some(path),
        seasons: reports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::find_brand;
    use crate::query::Statement;
    use crate::summary::MONETARY_COLUMNS;
    use crate::table::Table;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::env;
    use std::sync::Mutex;

    /// Serves canned tables keyed by (brand, period end) and logs statements.
    #[derive(Default)]
    struct FakeWarehouse {
        tables: HashMap<(String, String), Table>,
        seen: Mutex<Vec<Statement>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl Warehouse for FakeWarehouse {
        async fn query(&self, statement: &Statement) -> Result<Table> {
            self.seen.lock().unwrap().push(statement.clone());
            let brand = statement.binds[statement.binds.len() - 5].clone();
            let period_end = statement.binds.last().unwrap().clone();
            if self.fail_on.as_deref() == Some(period_end.as_str()) {
                anyhow::bail!("warehouse unavailable");
            }
            Ok(self
                .tables
                .get(&(brand, period_end))
                .cloned()
                .unwrap_or_else(|| plain_table(&[])))
        }
    }

    fn plain_table(rows: &[(&str, i64)]) -> Table {
        let columns = ["CHNL_CD", "CHNL_NM"]
            .iter()
            .chain(MONETARY_COLUMNS.iter())
            .map(|c| c.to_string())
            .collect();
        let rows = rows
            .iter()
            .map(|(chnl, ryt)| {
                let mut row = vec![Cell::from(*chnl), Cell::from("Channel")];
                row.push(Cell::Number(Decimal::from(*ryt)));
                row.extend((1..MONETARY_COLUMNS.len()).map(|_| Cell::Null));
                row
            })
            .collect();
        Table::new(columns, rows)
    }

    fn plan(dir: &str, brands: &[&str], seasons: &[&str]) -> ExportPlan {
        ExportPlan {
            brands: brands.iter().map(|b| find_brand(b).unwrap()).collect(),
            seasons: seasons.iter().map(|s| Season::parse(s).unwrap()).collect(),
            mode: QueryMode::Plain,
            output_dir: env::temp_dir().join(dir),
            timestamp: "20240901_120000".into(),
        }
    }

    #[test]
    fn test_names() {
        let season = Season::parse("23S").unwrap();
        assert_eq!(
            output_file_name("ST", "20250101_093000"),
            "dcst_raw_data_ST_20250101_093000.xlsx"
        );
        assert_eq!(raw_sheet_name(&season), "23S_RAW");
        assert_eq!(summary_sheet_name(&season), "23S_SUMMARY");
    }

    #[tokio::test]
    async fn test_export_writes_one_workbook_per_brand_with_data() {
        let plan = plan("dcst_export_test_run", &["M", "I"], &["23S", "24S"]);
        let _ = fs::remove_dir_all(&plan.output_dir);

        let mut warehouse = FakeWarehouse::default();
        warehouse.tables.insert(
            ("M".into(), "202308".into()),
            plain_table(&[("1", 10), ("2", 20), ("1", 5)]),
        );
        warehouse
            .tables
            .insert(("M".into(), "202408".into()), plain_table(&[("3", 1)]));

        let reports = run_export(&warehouse, &plan).await.unwrap();

        assert_eq!(reports.len(), 2);
        let mlb = &reports[0];
        assert_eq!(
            mlb.seasons,
            vec![
                SeasonReport {
                    season: "23S".into(),
                    raw_rows: 3,
                    summary_rows: 2
                },
                SeasonReport {
                    season: "24S".into(),
                    raw_rows: 1,
                    summary_rows: 1
                },
            ]
        );
        let path = mlb.path.as_ref().unwrap();
        assert!(path.ends_with("dcst_raw_data_M_20240901_120000.xlsx"));
        assert!(path.exists());

        let kids = &reports[1];
        assert_eq!(kids.brand.code, "I");
        assert_eq!(kids.path, None);
        assert!(kids.seasons.is_empty());
        assert!(!plan.output_dir.join(output_file_name("I", &plan.timestamp)).exists());

        // brand × season, strictly in order
        let seen = warehouse.seen.lock().unwrap();
        let order: Vec<_> = seen
            .iter()
            .map(|s| (s.binds[0].as_str(), s.binds[4].as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("M", "202308"), ("M", "202408"), ("I", "202308"), ("I", "202408")]
        );
        drop(seen);

        fs::remove_dir_all(&plan.output_dir).unwrap();
    }

    #[tokio::test]
    async fn test_empty_season_is_skipped() {
        let plan = plan("dcst_export_test_skip", &["X"], &["23S", "24S"]);
        let _ = fs::remove_dir_all(&plan.output_dir);

        let mut warehouse = FakeWarehouse::default();
        warehouse
            .tables
            .insert(("X".into(), "202408".into()), plain_table(&[("1", 1)]));

        let reports = run_export(&warehouse, &plan).await.unwrap();

        let seasons: Vec<_> = reports[0].seasons.iter().map(|s| s.season.as_str()).collect();
        assert_eq!(seasons, vec!["24S"]);
        assert!(reports[0].path.as_ref().unwrap().exists());

        fs::remove_dir_all(&plan.output_dir).unwrap();
    }

    #[tokio::test]
    async fn test_repeated_season_is_exported_once() {
        let plan = plan("dcst_export_test_repeat", &["M"], &["24S", "24s"]);
        let _ = fs::remove_dir_all(&plan.output_dir);

        let mut warehouse = FakeWarehouse::default();
        warehouse
            .tables
            .insert(("M".into(), "202408".into()), plain_table(&[("1", 1)]));

        let reports = run_export(&warehouse, &plan).await.unwrap();

        assert_eq!(reports[0].seasons.len(), 1);
        assert!(reports[0].path.as_ref().unwrap().exists());
        assert_eq!(warehouse.seen.lock().unwrap().len(), 1);

        fs::remove_dir_all(&plan.output_dir).unwrap();
    }

    #[tokio::test]
    async fn test_query_failure_aborts_with_context() {
        let plan = plan("dcst_export_test_fail", &["V", "ST"], &["25S"]);
        let _ = fs::remove_dir_all(&plan.output_dir);

        let warehouse = FakeWarehouse {
            fail_on: Some("202508".into()),
            ..Default::default()
        };

        let err = run_export(&warehouse, &plan).await.unwrap_err();

        assert_eq!(err.to_string(), "Query failed for brand V season 25S");
        assert_eq!(format!("{err:#}"), "Query failed for brand V season 25S: warehouse unavailable");
        // the second brand is never attempted
        assert_eq!(warehouse.seen.lock().unwrap().len(), 1);

        fs::remove_dir_all(&plan.output_dir).unwrap();
    }
}
