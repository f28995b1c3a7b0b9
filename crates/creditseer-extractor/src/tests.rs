//! End-to-end tests: chunking through both extraction stages

#[cfg(test)]
mod tests {
    use crate::{Chunker, ExtractorConfig, Stage1Extractor, Stage2Extractor};
    use creditseer_domain::{AnomalyKind, ChunkType, FieldValue};
    use creditseer_llm::MockProvider;
    use creditseer_schema::SchemaRegistry;
    use std::sync::Arc;

    const AGREEMENT: &str = "CREDIT AGREEMENT\n\
dated as of June 30, 2024\n\
among ACME HOLDINGS, INC., as Borrower\n\
\n\
ARTICLE I\n\
DEFINITIONS\n\
\n\
\"Consolidated EBITDA\" means Consolidated Net Income plus interest expense, plus taxes, \
plus depreciation; provided that add-backs shall not exceed $25,000,000 in any period.\n\
\n\
\"Lender\" means each lender party hereto.\n\
\n\
ARTICLE II\n\
THE CREDITS\n\
\n\
SECTION 2.01 Commitments. Each Lender agrees to make Revolving Loans in an aggregate \
amount not exceeding $100,000,000.\n";

    fn config() -> ExtractorConfig {
        ExtractorConfig {
            retry_backoff_ms: 1,
            ..ExtractorConfig::default()
        }
    }

    #[test]
    fn test_agreement_chunks() {
        let chunks = Chunker::new().chunk(AGREEMENT);
        let types: Vec<ChunkType> = chunks.iter().map(|c| c.chunk_type).collect();
        assert_eq!(
            types,
            vec![ChunkType::Cover, ChunkType::Definitions, ChunkType::Credits]
        );
        assert_eq!(chunks[1].title, "ARTICLE I DEFINITIONS");
    }

    #[tokio::test]
    async fn test_definitions_through_both_stages() {
        let provider = MockProvider::new("{}");
        provider.push_response(
            r#"{"blocks": [
                {"blockId": "Consolidated EBITDA", "valueType": "definition_clause",
                 "text": "\"Consolidated EBITDA\" means Consolidated Net Income plus interest expense, plus taxes, plus depreciation; provided that add-backs shall not exceed $25,000,000 in any period."},
                {"blockId": "Defined Term", "valueType": "term", "text": "\"Lender\" means each lender party hereto."},
                {"blockId": "Defined Term", "valueType": "term", "text": "\"Borrower\" means Acme Holdings, Inc."}
            ]}"#,
        );
        provider.push_response(
            r#"{"values": [
                {"blockId": "Consolidated EBITDA", "field": "definedTerm", "value": "Consolidated EBITDA", "confidence": "high"},
                {"blockId": "Consolidated EBITDA", "field": "addBacks", "value": ["interest expense", "taxes", "depreciation"], "confidence": "high"},
                {"blockId": "Consolidated EBITDA", "field": "capAmount", "value": "$25,000,000", "confidence": "high"}
            ]}"#,
        );

        let registry = SchemaRegistry::builtin().unwrap();
        let service = Arc::new(provider.clone());
        let chunks = Chunker::new().chunk(AGREEMENT);
        let definitions = &chunks[1];

        let stage1 = Stage1Extractor::new(service.clone(), config())
            .extract(definitions, registry.stage1(ChunkType::Definitions).unwrap())
            .await
            .unwrap();

        // The Borrower definition is not in this chunk
        assert_eq!(stage1.blocks.len(), 2);
        assert_eq!(stage1.anomalies.len(), 1);
        assert_eq!(stage1.anomalies[0].kind, AnomalyKind::UngroundedBlock);
        for block in &stage1.blocks {
            assert_eq!(block.span.slice(&definitions.text), Some(block.text.as_str()));
        }

        let stage2 = Stage2Extractor::new(service, config())
            .extract(&stage1.blocks, registry.stage2(ChunkType::Definitions).unwrap())
            .await
            .unwrap();

        assert!(stage2.anomalies.is_empty(), "{:?}", stage2.anomalies);
        assert_eq!(stage2.values.len(), 3);
        let add_backs = stage2.values.iter().find(|v| v.field == "addBacks").unwrap();
        assert_eq!(
            add_backs.value,
            FieldValue::Multiple(vec![
                "interest expense".into(),
                "taxes".into(),
                "depreciation".into()
            ])
        );
        assert_eq!(add_backs.block_id, "Consolidated EBITDA");
        for value in &stage2.values {
            assert!(value.confidence <= value.assessment.level);
        }
        // Only the definition clause has Stage 2 fields; the term block is skipped
        assert!(stage2
            .missing
            .iter()
            .all(|m| m.block_ref == add_backs.block_ref && m.field == "definitionSummary"));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_cover_has_no_stage2_schema() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert!(registry.stage1(ChunkType::Cover).is_ok());
        assert!(registry.stage2(ChunkType::Cover).is_none());
    }

    #[tokio::test]
    async fn test_service_outage_aborts_the_stage() {
        let provider = MockProvider::new("{}");
        provider.add_error("Chunk Type: definitions");
        let registry = SchemaRegistry::builtin().unwrap();
        let chunks = Chunker::new().chunk(AGREEMENT);

        let result = Stage1Extractor::new(Arc::new(provider.clone()), config())
            .extract(&chunks[1], registry.stage1(ChunkType::Definitions).unwrap())
            .await;
        assert!(result.is_err());
        assert_eq!(provider.call_count(), config().max_attempts as usize);
    }
}
