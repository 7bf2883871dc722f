// ==========================================
// 混凝土站核心 - 周切片
// ==========================================
// 规则: 按自然周（周一 ~ 周日）切分，首尾按查询范围截断
// 顺序: 默认新→旧，可配置旧→新
// ==========================================

use crate::domain::quality::WeekSlice;
use crate::domain::types::SliceOrder;
use chrono::{Datelike, Duration, NaiveDate};

/// 所在周的周一
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// 将 [from, to] 切分为周切片（闭区间）
///
/// from > to 时返回空
pub fn week_slices(from: NaiveDate, to: NaiveDate, order: SliceOrder) -> Vec<WeekSlice> {
    let mut slices = Vec::new();
    if from > to {
        return slices;
    }

    let mut monday = week_start(from);
    while monday <= to {
        let sunday = monday + Duration::days(6);
        slices.push(WeekSlice {
            start: monday.max(from),
            end: sunday.min(to),
        });
        monday += Duration::days(7);
    }

    if order == SliceOrder::NewestFirst {
        slices.reverse();
    }
    slices
}
