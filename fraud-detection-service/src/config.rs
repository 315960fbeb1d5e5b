/// Service configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub catalog: String,
    pub schema: String,
    pub warehouse_id: String,
    pub environment: String,
    pub llm_endpoint: String,
    pub genie_space_id: Option<String>,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog: "fraud_detection_dev".to_string(),
            schema: "claims_analysis".to_string(),
            warehouse_id: "148ccb90800933a1".to_string(),
            environment: "dev".to_string(),
            llm_endpoint: "databricks-claude-sonnet-4-5".to_string(),
            genie_space_id: None,
            port: 8000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            catalog: var_or("CATALOG_NAME", defaults.catalog),
            schema: var_or("SCHEMA_NAME", defaults.schema),
            warehouse_id: var_or("DATABRICKS_WAREHOUSE_ID", defaults.warehouse_id),
            environment: var_or("ENVIRONMENT", defaults.environment),
            llm_endpoint: var_or("LLM_ENDPOINT", defaults.llm_endpoint),
            genie_space_id: std::env::var("GENIE_SPACE_ID")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
        }
    }

    /// Fully qualified name of an object in the configured catalog and schema.
    pub fn qualified(&self, name: &str) -> String {
        format!("{}.{}.{}", self.catalog, self.schema, name)
    }

    pub fn vector_index(&self) -> String {
        self.qualified("fraud_cases_index")
    }

    pub fn analysis_table(&self) -> String {
        self.qualified("fraud_analysis")
    }

    pub fn genie_config_table(&self) -> String {
        self.qualified("config_genie")
    }
}

fn var_or(name: &str, default: String) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}
