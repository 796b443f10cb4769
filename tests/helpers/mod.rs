// ==========================================
// 集成测试辅助模块
// ==========================================

#![allow(dead_code)]

pub mod event_log_builder;
