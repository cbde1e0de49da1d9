//! Read-only statements against `sap_fnf.dm_dcst_shop_prdt_m`.
//!
//! Every variable part of a statement is a positional `?` bind; the SQL text
//! itself is constant.

use clap::ValueEnum;

use crate::catalog::{Brand, Season};

/// Company code the export is restricted to.
pub const CORP_CODE: &str = "1000";
/// Channel code excluded from every export.
pub const EXCLUDED_CHANNEL: &str = "9";

/// Labels produced for `ITEM_STD`, in rule order.
pub const ITEM_STD_LABELS: [&str; 9] = [
    "당시즌 의류",
    "전시즌 의류",
    "차기시즌 의류",
    "과시즌 의류",
    "모자",
    "신발",
    "가방",
    "기타ACC",
    "기타",
];

/// A SQL statement plus its positional text binds, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<String>,
}

impl Statement {
    fn new(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            binds: Vec::new(),
        }
    }

    fn bind(mut self, value: impl Into<String>) -> Self {
        self.binds.push(value.into());
        self
    }

    /// Binds shared by both statements, matching the trailing `WHERE` clause.
    fn bind_window(self, brand: &Brand, season: &Season) -> Self {
        self.bind(brand.code)
            .bind(CORP_CODE)
            .bind(EXCLUDED_CHANNEL)
            .bind(&season.current_season_start)
            .bind(&season.period_end)
    }
}

const RAW_ROWS_SQL: &str = "\
select
    a.PST_YYYYMM,
    a.CORP_CD,
    a.CORP_NM,
    a.BRD_CD,
    a.BRD_NM,
    a.CHNL_CD,
    a.CHNL_NM,
    a.SHOP_CD,
    a.SHOP_NM,
    a.RF_YN,
    a.PRDT_CD,
    a.PRDT_NM,
    a.RYT,
    a.LGT_CST,
    a.CARD_CMS,
    a.SHOP_RNT,
    a.SHOP_DEPRC_CST,
    a.SM_CMS,
    a.DF_SALE_STFF_CMS,
    a.DMGMT_SALE_STFF_CMS,
    a.ALNC_ONLN_CMS,
    a.DSTRB_CMS,
    a.STRG_CST
from sap_fnf.dm_dcst_shop_prdt_m a
where a.brd_cd = ?
  and a.corp_cd = ?
  and a.chnl_cd not in (?)
  and a.chnl_cd is not null
  and a.pst_yyyymm between ? and ?
order by a.pst_yyyymm, a.chnl_cd, a.shop_cd, a.prdt_cd";

// Binds: period_end, probe, period_end, probe, brand, then the shared window.
const RAW_ROWS_WITH_ITEM_STD_SQL: &str = "\
with cy_item as (
    select a.prdt_cd
         , a.sesn
         , a.prdt_hrrc1_nm
         , a.prdt_hrrc2_nm
         , a.prdt_hrrc3_nm
         , case when (? between b.start_yyyymm and b.end_yyyymm) and prdt_hrrc1_nm = '의류'
                    then '당시즌 의류'
                when (? between b.start_yyyymm and b.end_yyyymm) and prdt_hrrc1_nm = '의류'
                    then '전시즌 의류'
                when (b.start_yyyymm > ?) and prdt_hrrc1_nm = '의류'
                    then '차기시즌 의류'
                when (b.start_yyyymm < ?) and prdt_hrrc1_nm = '의류'
                    then '과시즌 의류'
                when prdt_hrrc1_nm = 'ACC' and prdt_hrrc2_nm = 'Headwear'
                    then '모자'
                when prdt_hrrc1_nm = 'ACC' and prdt_hrrc2_nm = 'Shoes'
                    then '신발'
                when prdt_hrrc1_nm = 'ACC' and prdt_hrrc2_nm = 'Bag'
                    then '가방'
                when prdt_hrrc1_nm = 'ACC' and prdt_hrrc2_nm = 'Acc_etc'
                    then '기타ACC'
                else '기타' end as item_std
    from sap_fnf.mst_prdt a
    left join comm.mst_sesn b
        on a.sesn = b.sesn
    where brd_cd = ?
)
select
    a.PST_YYYYMM,
    a.CORP_CD,
    a.CORP_NM,
    a.BRD_CD,
    a.BRD_NM,
    a.CHNL_CD,
    a.CHNL_NM,
    a.SHOP_CD,
    a.SHOP_NM,
    a.RF_YN,
    a.PRDT_CD,
    a.PRDT_NM,
    c.SESN,
    c.PRDT_HRRC1_NM,
    c.PRDT_HRRC2_NM,
    c.PRDT_HRRC3_NM,
    c.ITEM_STD,
    a.RYT,
    a.LGT_CST,
    a.CARD_CMS,
    a.SHOP_RNT,
    a.SHOP_DEPRC_CST,
    a.SM_CMS,
    a.DF_SALE_STFF_CMS,
    a.DMGMT_SALE_STFF_CMS,
    a.ALNC_ONLN_CMS,
    a.DSTRB_CMS,
    a.STRG_CST
from sap_fnf.dm_dcst_shop_prdt_m a
left join cy_item c on a.prdt_cd = c.prdt_cd
where a.brd_cd = ?
  and a.corp_cd = ?
  and a.chnl_cd not in (?)
  and a.chnl_cd is not null
  and a.pst_yyyymm between ? and ?
order by a.pst_yyyymm, a.chnl_cd, a.shop_cd, a.prdt_cd";

/// Raw distribution-cost rows for one brand over the season's query window.
pub fn raw_rows(brand: &Brand, season: &Season) -> Statement {
    Statement::new(RAW_ROWS_SQL).bind_window(brand, season)
}

/// Raw rows joined with the product's season and hierarchy, plus the
/// `ITEM_STD` classification relative to `season`.
pub fn raw_rows_with_item_std(brand: &Brand, season: &Season) -> Statement {
    let probe = season.previous_season_probe();
    Statement::new(RAW_ROWS_WITH_ITEM_STD_SQL)
        .bind(&season.period_end)
        .bind(&probe)
        .bind(&season.period_end)
        .bind(&probe)
        .bind(brand.code)
        .bind_window(brand, season)
}

/// Which statement feeds the export, and how its summary is grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum QueryMode {
    /// Join product classification and group by channel and `ITEM_STD`.
    #[default]
    ItemStd,
    /// Table columns only, grouped by channel.
    Plain,
}

impl QueryMode {
    pub fn statement(self, brand: &Brand, season: &Season) -> Statement {
        match self {
            QueryMode::ItemStd => raw_rows_with_item_std(brand, season),
            QueryMode::Plain => raw_rows(brand, season),
        }
    }

    /// Column appended to every raw row, holding the season code.
    pub fn season_column(self) -> &'static str {
        match self {
            QueryMode::ItemStd => "QUERY_SEASON",
            QueryMode::Plain => "SEASON",
        }
    }

    pub fn group_by(self) -> &'static [&'static str] {
        match self {
            QueryMode::ItemStd => &["CHNL_CD", "CHNL_NM", "ITEM_STD"],
            QueryMode::Plain => &["CHNL_CD", "CHNL_NM"],
        }
    }
}
