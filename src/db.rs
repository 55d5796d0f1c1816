use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, GetPointsBuilder, PointId, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::MemoryError;

/// 集合统计信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_points: u64,
    pub collection_name: String,
}

/// 待写入的记忆点
#[derive(Debug, Clone)]
pub struct MemoryPoint {
    pub id: String,
    pub memory: String,
    pub user_id: String,
    pub embedding: Vec<f32>,
}

/// 一条记忆
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryItem {
    pub id: String,
    /// 记忆内容
    pub memory: String,
    pub user_id: String,
    /// 写入时间戳（秒）
    pub created_at: i64,
    /// 相似度分数，仅搜索结果有
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

pub struct VectorDB {
    client: Qdrant,
    collection_name: String,
    dims: u64,
    on_disk: bool,
}

impl VectorDB {
    /// 创建 Qdrant 客户端（此时不会发起连接）
    ///
    /// # 参数
    /// - `dims`: 向量维度
    /// - `on_disk`: 向量是否存放在磁盘上（而不是内存）
    pub fn new(
        uri: &str,
        collection_name: &str,
        dims: usize,
        on_disk: bool,
    ) -> Result<Self, MemoryError> {
        let client = Qdrant::from_url(uri).build()?;
        Ok(Self {
            client,
            collection_name: collection_name.to_string(),
            dims: dims as u64,
            on_disk,
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// 初始化集合 Schema，已存在则直接复用
    pub async fn init_collection(&self) -> Result<(), MemoryError> {
        if !self.client.collection_exists(&self.collection_name).await? {
            info!(
                collection = %self.collection_name,
                dims = self.dims,
                on_disk = self.on_disk,
                "creating collection"
            );

            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection_name)
                        .vectors_config(vector_params(self.dims, self.on_disk)),
                )
                .await?;
        } else {
            info!(collection = %self.collection_name, "collection already exists");
        }
        Ok(())
    }

    /// 批量写入记忆，返回写入时间戳
    pub async fn upsert_batch(&self, memory_points: Vec<MemoryPoint>) -> Result<i64, MemoryError> {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

        let points: Vec<PointStruct> = memory_points
            .into_iter()
            .map(|mp| {
                PointStruct::new(
                    mp.id,
                    mp.embedding,
                    [
                        ("memory", mp.memory.into()),
                        ("user_id", mp.user_id.into()),
                        ("created_at", timestamp.into()),
                    ],
                )
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, points).wait(true))
            .await?;

        Ok(timestamp)
    }

    /// 搜索相似记忆
    ///
    /// # 参数
    /// - `query_vector`: 查询向量
    /// - `limit`: 返回结果数量
    /// - `user_id`: 只返回该用户的记忆
    ///
    /// # 返回
    /// 按相似度从高到低排序
    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        user_id: Option<&str>,
    ) -> Result<Vec<MemoryItem>, MemoryError> {
        let mut request =
            SearchPointsBuilder::new(&self.collection_name, query_vector, limit as u64)
                .with_payload(true);

        if let Some(user_id) = user_id {
            request = request.filter(Filter::must([Condition::matches(
                "user_id",
                user_id.to_string(),
            )]));
        }

        let search_result = self.client.search_points(request).await?;

        Ok(search_result
            .result
            .into_iter()
            .map(|point| {
                item_from_payload(point_id_to_string(point.id), &point.payload, Some(point.score))
            })
            .collect())
    }

    /// 按 id 取一条记忆
    pub async fn get(&self, id: PointId) -> Result<Option<MemoryItem>, MemoryError> {
        let response = self
            .client
            .get_points(GetPointsBuilder::new(&self.collection_name, vec![id]).with_payload(true))
            .await?;

        Ok(response
            .result
            .into_iter()
            .next()
            .map(|point| item_from_payload(point_id_to_string(point.id), &point.payload, None)))
    }

    /// 获取集合统计信息
    pub async fn get_stats(&self) -> Result<CollectionStats, MemoryError> {
        let collection_info = self.client.collection_info(&self.collection_name).await?;

        let points_count = collection_info
            .result
            .and_then(|r| r.points_count)
            .unwrap_or(0);

        Ok(CollectionStats {
            total_points: points_count,
            collection_name: self.collection_name.clone(),
        })
    }
}

fn vector_params(dims: u64, on_disk: bool) -> VectorParamsBuilder {
    VectorParamsBuilder::new(dims, Distance::Cosine).on_disk(on_disk)
}

/// 解析 id 字符串：UUID 或 无符号整数，其它格式返回 `None`
pub fn parse_point_id(id: &str) -> Option<PointId> {
    if Uuid::parse_str(id).is_ok() {
        return Some(PointId::from(id.to_string()));
    }
    id.parse::<u64>().ok().map(PointId::from)
}

fn point_id_to_string(id: Option<PointId>) -> String {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

fn item_from_payload(id: String, payload: &HashMap<String, Value>, score: Option<f32>) -> MemoryItem {
    let text = |key: &str| {
        payload
            .get(key)
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .unwrap_or_default()
    };

    let created_at = payload
        .get("created_at")
        .and_then(|v| v.as_integer())
        .unwrap_or(0);

    MemoryItem {
        id,
        memory: text("memory"),
        user_id: text("user_id"),
        created_at,
        score,
    }
}
