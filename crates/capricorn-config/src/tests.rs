#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_defaults_match_extraction_contract() {
        let cfg = Config::default();
        assert_eq!(cfg.pipeline.default_num_articles, 15);
        assert_eq!(cfg.pipeline.temperature, 0.0);
        assert_eq!(cfg.pipeline.retry_base_delay(), Duration::from_secs(5));
        assert_eq!(cfg.pipeline.retry_max_delay(), Duration::from_secs(300));
        assert_eq!(cfg.pipeline.inter_article_delay(), Duration::from_secs(5));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            [server]
            port = 9000
            allowed_origins = ["http://localhost:3000"]

            [analysis]
            variant = "markdown"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.analysis.variant, AnalysisVariant::Markdown);
        assert_eq!(cfg.llm.provider, LlmProvider::Gemini);
        assert_eq!(cfg.database.articles_table, "articles");
    }

    #[test]
    fn test_yaml_is_accepted() {
        let cfg = Config::from_yaml_str(
            "llm:\n  provider: openai_compatible\n  model: llama3\n  base_url: http://localhost:11434\n",
        )
        .unwrap();
        assert_eq!(cfg.llm.provider, LlmProvider::OpenaiCompatible);
        assert_eq!(cfg.llm.base_url.as_deref(), Some("http://localhost:11434"));
    }

    #[test]
    fn test_base_delay_above_ceiling_is_invalid() {
        let mut cfg = Config::default();
        cfg.pipeline.retry_base_delay_ms = 600_000;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_table_names_are_identifiers() {
        let mut cfg = Config::default();
        cfg.database.journal_table = "journal_rank; DROP TABLE articles".to_string();
        assert!(cfg.validate().is_err());
        cfg.database.journal_table = "journal_rank.scimagojr_2023".to_string();
        assert!(cfg.validate().is_ok());
    }
}
