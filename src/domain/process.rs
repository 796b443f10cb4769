// ==========================================
// 制造运营雷达 - 流程模型
// ==========================================
// 职责: 流程图 / 工序统计缓存 / 交付周期 / 路径变体 / 流程概览
// 说明: 由 ProcessMiningEngine 每次分析新建,其余分析器只读
// ==========================================

use crate::domain::event::CanonicalFlow;
use crate::domain::types::Ratio;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ==========================================
// ProcessGraph - 观察到的流程图
// ==========================================
// 节点: 观察到的工序; 边: (来源工序, 目标工序) -> 转移次数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessGraph {
    nodes: BTreeSet<String>,
    edges: BTreeMap<String, BTreeMap<String, u64>>,
}

/// 流程图中的一条边
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from_operation: String,
    pub to_operation: String,
    pub transition_count: u64,
}

impl ProcessGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, operation: &str) {
        self.nodes.insert(operation.to_string());
    }

    pub fn record_transition(&mut self, from: &str, to: &str) {
        self.add_node(from);
        self.add_node(to);
        *self
            .edges
            .entry(from.to_string())
            .or_default()
            .entry(to.to_string())
            .or_insert(0) += 1;
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|s| s.as_str())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn transition_count(&self, from: &str, to: &str) -> u64 {
        self.edges
            .get(from)
            .and_then(|targets| targets.get(to))
            .copied()
            .unwrap_or(0)
    }

    /// 所有边 (按来源、目标字典序)
    pub fn edges(&self) -> Vec<GraphEdge> {
        self.edges
            .iter()
            .flat_map(|(from, targets)| {
                targets.iter().map(move |(to, &count)| GraphEdge {
                    from_operation: from.clone(),
                    to_operation: to.clone(),
                    transition_count: count,
                })
            })
            .collect()
    }

    pub fn total_transitions(&self) -> u64 {
        self.edges.values().flat_map(|t| t.values()).sum()
    }

    /// 返工回路边: 目标工序标准位置 <= 来源工序标准位置
    pub fn rework_edges(&self, flow: &CanonicalFlow) -> Vec<GraphEdge> {
        self.edges()
            .into_iter()
            .filter(|edge| {
                match (
                    flow.position_of(&edge.from_operation),
                    flow.position_of(&edge.to_operation),
                ) {
                    (Some(from), Some(to)) => to <= from,
                    _ => false,
                }
            })
            .collect()
    }
}

// ==========================================
// OperationStats - 工序统计缓存
// ==========================================
/// 每次分析计算一次的工序聚合统计 (时间单位: 小时)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    pub operation: String,
    pub position: u32,
    pub visit_count: usize,
    pub normal_count: usize,
    pub rework_count: usize,
    pub mean_cycle_hours: f64,
    pub cycle_variance: f64,
    pub min_cycle_hours: f64,
    pub max_cycle_hours: f64,
    pub total_cycle_hours: f64,
    pub mean_wait_hours: f64,
    pub total_wait_hours: f64,
}

/// 单个工件的交付周期
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceLeadTime {
    pub piece_id: String,
    pub lead_time_hours: f64,
    pub event_count: usize,
}

/// 路径变体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessVariant {
    /// 工序序列,以 " → " 连接
    pub trace: String,
    pub piece_count: usize,
    pub frequency: f64,
}

/// 流程概览
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessOverview {
    pub piece_count: usize,
    pub operation_count: usize,
    pub event_count: usize,
    pub lead_time_mean_hours: f64,
    pub lead_time_std_hours: f64,
    pub lead_time_min_hours: f64,
    pub lead_time_max_hours: f64,
    pub horizon_hours: f64,
    pub throughput_per_hour: Ratio,
    pub throughput_per_day: Ratio,
    /// status == rework 的事件占比
    pub rework_status_share: f64,
}

// ==========================================
// ProcessModel - 流程挖掘结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessModel {
    pub log_version: String,
    pub graph: ProcessGraph,
    /// 仅包含观察到的工序,按标准位置升序
    pub operation_stats: Vec<OperationStats>,
    /// 按 piece_id 升序
    pub lead_times: Vec<PieceLeadTime>,
    pub variants: Vec<ProcessVariant>,
    pub overview: ProcessOverview,
}

impl ProcessModel {
    pub fn stats_for(&self, operation: &str) -> Option<&OperationStats> {
        self.operation_stats.iter().find(|s| s.operation == operation)
    }

    pub fn lead_time_mean_hours(&self) -> f64 {
        self.overview.lead_time_mean_hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::Operation;

    #[test]
    fn test_graph_counts_and_rework_edges() {
        let mut graph = ProcessGraph::new();
        graph.record_transition("A", "B");
        graph.record_transition("A", "B");
        graph.record_transition("B", "B");
        graph.record_transition("B", "A");

        assert_eq!(graph.transition_count("A", "B"), 2);
        assert_eq!(graph.transition_count("B", "C"), 0);
        assert_eq!(graph.total_transitions(), 4);
        assert_eq!(graph.node_count(), 2);

        let flow = CanonicalFlow::from_operations(vec![
            Operation::new("A", 1),
            Operation::new("B", 2),
        ])
        .unwrap();
        let loops = graph.rework_edges(&flow);
        assert_eq!(loops.len(), 2);
        assert!(loops.iter().all(|e| e.from_operation == "B"));
    }

    #[test]
    fn test_graph_serializes_deterministically() {
        let mut g1 = ProcessGraph::new();
        g1.record_transition("B", "C");
        g1.record_transition("A", "B");

        let mut g2 = ProcessGraph::new();
        g2.record_transition("A", "B");
        g2.record_transition("B", "C");

        assert_eq!(
            serde_json::to_string(&g1).unwrap(),
            serde_json::to_string(&g2).unwrap()
        );
    }
}
