// ==========================================
// 混凝土站核心 - 渐进式质量汇总
// ==========================================
// 职责: 按周切片逐段拉取送货单，每段合并后整体重算并发布
// 流程: 订单 id（一次）→ 周切片（串行）→ 映射 → 合并 → 重算 → 发布
// 红线:
//   - 零订单直接发布空结果，不查询送货单
//   - 每次发布前校验代次，过期的运行不得覆盖新结果
//   - 累积器以送货单 id 为键，重复合并不重复计数
// ==========================================

use crate::config::plant_config_trait::PlantConfigReader;
use crate::config::settings::QualitySettings;
use crate::domain::quality::{
    LoadProgress, QualityData, QualityLoadState, QualityQuery, QualityRemision, QualitySummary,
    RemisionRecord, WeekSlice,
};
use crate::engine::error::{QualityError, QualityResult};
use crate::engine::quality_aggregator::QualityAggregator;
use crate::engine::quality_mapper::QualityMapper;
use crate::engine::week_slicer::week_slices;
use crate::repository::error::RepositoryResult;
use crate::repository::quality_repo::QualityRepository;
use crate::repository::sql_utils::chunk_values;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// 一次加载的结局
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// 正常结束（含零订单短路）
    Completed(QualityLoadState),
    /// 被更新的加载取代，结果已丢弃
    Superseded,
}

// ==========================================
// ProgressiveQualityLoader
// ==========================================
pub struct ProgressiveQualityLoader<R>
where
    R: QualityRepository + ?Sized,
{
    repo: Arc<R>,
    settings: QualitySettings,
    mapper: QualityMapper,
    aggregator: QualityAggregator,

    // 代次令牌：每次 load 自增，发布前比对
    generation: AtomicU64,

    state_tx: watch::Sender<QualityLoadState>,
}

impl<R> ProgressiveQualityLoader<R>
where
    R: QualityRepository + ?Sized,
{
    pub fn new(repo: Arc<R>, settings: QualitySettings) -> Self {
        let (state_tx, _) = watch::channel(QualityLoadState::default());
        Self {
            mapper: QualityMapper::new(settings.compliant_threshold, settings.pending_threshold),
            aggregator: QualityAggregator::new(settings.pending_threshold),
            repo,
            settings,
            generation: AtomicU64::new(0),
            state_tx,
        }
    }

    /// 从配置读取参数后创建
    pub async fn from_config<C>(repo: Arc<R>, config: &C) -> QualityResult<Self>
    where
        C: PlantConfigReader + ?Sized,
    {
        let settings = QualitySettings::load(config)
            .await
            .map_err(|e| QualityError::ConfigReadError(e.to_string()))?;
        Ok(Self::new(repo, settings))
    }

    pub fn settings(&self) -> &QualitySettings {
        &self.settings
    }

    /// 订阅状态（每次发布都会通知）
    pub fn subscribe(&self) -> watch::Receiver<QualityLoadState> {
        self.state_tx.subscribe()
    }

    /// 当前已发布的状态
    pub fn current_state(&self) -> QualityLoadState {
        self.state_tx.borrow().clone()
    }

    /// 作废正在进行的加载
    pub fn cancel(&self) {
        let next = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation = next, "质量加载已作废");
    }

    fn is_current(&self, token: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == token
    }

    /// 代次仍有效时发布，返回是否发布
    fn publish(&self, token: u64, state: &QualityLoadState) -> bool {
        if !self.is_current(token) {
            debug!(token, "代次已过期，丢弃发布");
            return false;
        }
        self.state_tx.send_replace(state.clone());
        true
    }

    /// 拉取单个周切片（订单 id 分块）
    async fn fetch_slice(
        &self,
        order_ids: &[String],
        slice: WeekSlice,
    ) -> RepositoryResult<Vec<RemisionRecord>> {
        let mut records = Vec::new();
        for chunk in chunk_values(order_ids, self.settings.order_chunk_size) {
            records.extend(
                self.repo
                    .find_remisiones_in_window(&chunk, slice.start, slice.end)
                    .await?,
            );
        }
        Ok(records)
    }

    fn recompute(&self, accumulator: &HashMap<String, QualityRemision>) -> (QualityData, QualitySummary) {
        self.aggregator
            .aggregate(accumulator.values().cloned().collect())
    }

    /// 加载客户在日期范围内的质量数据
    ///
    /// # 返回
    /// - Ok(Completed): 最终状态（也已发布）
    /// - Ok(Superseded): 被新的加载取代
    /// - Err: 前置步骤失败（错误状态已发布）
    #[instrument(skip(self, query), fields(client_id = %query.client_id, from = %query.from, to = %query.to))]
    pub async fn load(&self, query: QualityQuery) -> QualityResult<LoadOutcome> {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();

        let slices = week_slices(query.from, query.to, query.order);
        let mut state = QualityLoadState {
            loading: true,
            streaming: true,
            progress: LoadProgress {
                processed: 0,
                total: slices.len(),
            },
            ..Default::default()
        };
        if !self.publish(token, &state) {
            return Ok(LoadOutcome::Superseded);
        }

        // === 前置校验 ===
        let setup_error = if query.client_id.trim().is_empty() {
            Some(QualityError::MissingClientId)
        } else if query.from > query.to {
            Some(QualityError::InvalidRange {
                from: query.from,
                to: query.to,
            })
        } else {
            None
        };
        if let Some(err) = setup_error {
            return Err(self.fail(token, state, err));
        }

        // === 步骤 1: 订单 id（整个范围一次）===
        let order_ids = match self
            .repo
            .find_order_ids_for_client(&query.client_id, query.from, query.to)
            .await
        {
            Ok(ids) => ids,
            Err(source) => {
                let err = QualityError::OrdersLookup {
                    client_id: query.client_id.clone(),
                    source,
                };
                return Err(self.fail(token, state, err));
            }
        };

        if order_ids.is_empty() {
            info!("无订单，直接返回空结果");
            state.data = Some(QualityData::default());
            state.summary = Some(QualitySummary::default());
            state.loading = false;
            state.streaming = false;
            state.progress.processed = state.progress.total;
            return Ok(self.finish(token, state));
        }
        debug!(orders = order_ids.len(), slices = slices.len(), "订单解析完成");

        // === 步骤 2: 逐周切片 ===
        let mut accumulator: HashMap<String, QualityRemision> = HashMap::new();
        for slice in slices {
            if !self.is_current(token) {
                return Ok(LoadOutcome::Superseded);
            }

            match self.fetch_slice(&order_ids, slice).await {
                Ok(records) => {
                    debug!(start = %slice.start, end = %slice.end, remisiones = records.len(), "周切片拉取完成");
                    for record in records {
                        let remision = self.mapper.map_remision(record);
                        accumulator.insert(remision.id.clone(), remision);
                    }
                }
                Err(e) => {
                    warn!(start = %slice.start, end = %slice.end, error = %e, "周切片查询失败，按空结果处理");
                }
            }

            let (data, summary) = self.recompute(&accumulator);
            state.data = Some(data);
            state.summary = Some(summary);
            state.loading = false;
            state.progress.processed += 1;
            if !self.publish(token, &state) {
                return Ok(LoadOutcome::Superseded);
            }
        }

        // === 步骤 3: 结束 ===
        if state.data.is_none() {
            let (data, summary) = self.recompute(&accumulator);
            state.data = Some(data);
            state.summary = Some(summary);
        }
        state.loading = false;
        state.streaming = false;
        info!(
            remisiones = accumulator.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "质量数据加载完成"
        );
        Ok(self.finish(token, state))
    }

    fn finish(&self, token: u64, state: QualityLoadState) -> LoadOutcome {
        if self.publish(token, &state) {
            LoadOutcome::Completed(state)
        } else {
            LoadOutcome::Superseded
        }
    }

    /// 发布错误状态（保留已累积的数据）
    fn fail(&self, token: u64, mut state: QualityLoadState, err: QualityError) -> QualityError {
        error!(error = %err, "质量数据加载失败");
        state.loading = false;
        state.streaming = false;
        state.error = Some(err.to_string());
        self.publish(token, &state);
        err
    }
}
