//! 默认领域知识：各兵种部署规则与装备射程
//!
//! 由 retrieval.seed_defaults 开启；知识或装备集合已有条目时跳过，重复启动不会写入重复条目。

use std::collections::HashMap;

use crate::core::RetrievalError;
use crate::retrieval::{Collection, SimilarityStore};

/// (兵种, 部署规则)
const DEPLOYMENT_RULES: &[(&str, &str)] = &[
    (
        "light_infantry",
        "Light infantry deploys in medium elevation areas with gentle relief; slope gentle or flat. \
         Land cover may be tree, shrub or grass for concealment and mobility. \
         Keep a 100-300m buffer distance from residential areas and buildings.",
    ),
    (
        "heavy_infantry",
        "Heavy infantry suits low to medium elevation defensive positions with flat or moderate slope. \
         Land cover grass or bare/sparse vegetation. \
         Keep a 200-500m buffer distance from residential areas and buildings.",
    ),
    (
        "mechanized_infantry",
        "Mechanized infantry deploys in medium elevation transition zones with low to moderate slope \
         so armored vehicles can pass. Land cover grass or cropland. \
         Keep a 300-600m buffer distance from residential areas.",
    ),
    (
        "tank",
        "Tank units deploy in open areas at low to medium elevation with gentle overall slope. \
         Land cover grass, cropland or bare/sparse vegetation. \
         Keep a 500-1000m buffer distance from residential areas and buildings.",
    ),
    (
        "anti_tank_infantry",
        "Anti-tank infantry deploys in ambush positions at medium to high elevation with moderate or locally steep slope. \
         Land cover shrub, tree or building edges for concealment. \
         Keep a 150-400m buffer distance from residential areas.",
    ),
];

/// (兵种, 主要装备, 有效射程, 最大射程)
const EQUIPMENT: &[(&str, &str, &str, &str)] = &[
    ("light_infantry", "assault rifle", "300-400", "800"),
    ("heavy_infantry", "heavy machine gun", "400-500", "1000"),
    ("mechanized_infantry", "light tank", "500-600", "1200"),
    ("tank", "heavy tank", "600-700", "1500"),
    ("anti_tank_infantry", "anti-tank missile", "700-800", "1800"),
    ("self_propelled_artillery", "self-propelled gun", "800-900", "2000"),
    ("air_defense", "air defense missile", "1000-1100", "2400"),
    ("sniper", "sniper rifle", "1100-1200", "2600"),
];

/// 写入默认部署规则与装备信息，返回写入条数（已有数据时为 0）
pub async fn seed_defaults(store: &dyn SimilarityStore) -> Result<usize, RetrievalError> {
    let existing = store.count(Collection::Knowledge).await?
        + store.count(Collection::Equipment).await?;
    if existing > 0 {
        tracing::info!(existing, "knowledge already present, skipping default seed");
        return Ok(0);
    }
    let mut count = 0;
    for (unit, rule) in DEPLOYMENT_RULES {
        let metadata = HashMap::from([
            ("unit".to_string(), unit.to_string()),
            ("type".to_string(), "deployment_rule".to_string()),
        ]);
        store.add(Collection::Knowledge, rule, metadata).await?;
        count += 1;
    }
    for (unit, weapon, range, max_range) in EQUIPMENT {
        let text = format!(
            "{} is mainly equipped with {}, effective range {}m, maximum range {}m. \
             Consider the range when planning buffer distances so fire coverage is ensured.",
            unit.replace('_', " "),
            weapon,
            range,
            max_range
        );
        let metadata = HashMap::from([
            ("unit".to_string(), unit.to_string()),
            ("type".to_string(), "equipment_info".to_string()),
            ("range".to_string(), range.to_string()),
            ("max_range".to_string(), max_range.to_string()),
        ]);
        store.add(Collection::Equipment, &text, metadata).await?;
        count += 1;
    }
    tracing::info!(entries = count, "seeded default knowledge");
    Ok(count)
}
