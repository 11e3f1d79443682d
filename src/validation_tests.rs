#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;

    use crate::backend::{FeatureModel, GraphModel, StaticClient};
    use crate::config::EngineConfig;
    use crate::context::ValidationContext;
    use crate::diagnostics::{
        Diagnostic, Severity, ACTION_NOT_FOUND, BACKEND_FIELD_MISSING, FIELD_NOT_FOUND,
        GRAPH_TYPE_NOT_FOUND,
    };
    use crate::discovery::{validate_workspace, ScreenFileKind};
    use crate::store::MemoryStore;

    const SOURCE: &str = r#"@graphInfo({ graphType: "PX.Objects.SO.SOOrderEntry", primaryView: "Document" })
export class SO301000 extends PXScreen {
    Save: PXActionState;
    Document = createSingle(SOOrder);
}

export class SOOrder extends PXView {
    OrderNbr: PXFieldState;
    Status: PXFieldState;
}
"#;

    const MARKUP: &str = r#"<template>
  <qp-fieldset view.bind="Document">
    <field name="OrderNbr"></field>
    <field name="Missing"></field>
  </qp-fieldset>
  <qp-button state.bind="Hold"></qp-button>
</template>
"#;

    const GATED_SOURCE: &str = r#"@graphInfo({ graphType: "PX.Objects.IN.INReceiptEntry" })
@featureInstalled("PX.Objects.CS.FeaturesSet+Inventory")
export class IN301000 extends PXScreen {
    Document = createSingle(INRegister);
}

export class INRegister extends PXView {
    RefNbr: PXFieldState;
}
"#;

    fn codes(diagnostics: &[Diagnostic]) -> Vec<&str> {
        diagnostics.iter().map(|d| d.code.as_str()).collect()
    }

    fn screen_dir(source: &str, markup: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("SO301000.ts"), source).unwrap();
        fs::write(dir.path().join("SO301000.html"), markup).unwrap();
        dir
    }

    fn with_client(client: StaticClient) -> ValidationContext {
        ValidationContext::new(
            EngineConfig::default(),
            Rc::new(client),
            Rc::new(MemoryStore::new()),
        )
    }

    fn graphs(names: &[&str]) -> Option<Vec<GraphModel>> {
        Some(
            names
                .iter()
                .map(|name| GraphModel {
                    name: name.to_string(),
                    text: None,
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_markup_bindings_against_source() {
        let dir = screen_dir(SOURCE, MARKUP);
        let markup_path = dir.path().join("SO301000.html");
        let context = ValidationContext::offline(EngineConfig::default());

        let diagnostics = context.validate_markup_file(&markup_path, None).await;
        assert_eq!(codes(&diagnostics), vec![FIELD_NOT_FOUND, ACTION_NOT_FOUND]);
        assert!(diagnostics[0].message.contains("Missing"));
        assert_eq!(diagnostics[0].range.start.line, 3);
        assert_eq!(diagnostics[0].file.as_deref(), Some(markup_path.as_path()));
        assert!(diagnostics.iter().all(|d| d.severity == Severity::Error));

        let clean = r#"<qp-fieldset view.bind="Document"><field name="Status"></field></qp-fieldset>
<qp-button state.bind="Save"></qp-button>"#;
        assert!(context
            .validate_markup_file(&markup_path, Some(clean))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_next_line_directive_silences_only_its_code() {
        let dir = screen_dir(SOURCE, MARKUP);
        let markup_path = dir.path().join("SO301000.html");
        let context = ValidationContext::offline(EngineConfig::default());

        let suppressed = MARKUP.replace(
            "    <field name=\"Missing\">",
            "    <!-- acumate-disable-next-line field-not-found -->\n    <field name=\"Missing\">",
        );
        let diagnostics = context
            .validate_markup_file(&markup_path, Some(&suppressed))
            .await;
        assert_eq!(codes(&diagnostics), vec![ACTION_NOT_FOUND]);

        // Running the pass again over the same text gives the same answer.
        let again = context
            .validate_markup_file(&markup_path, Some(&suppressed))
            .await;
        assert_eq!(again, diagnostics);

        let file_wide = format!("<!-- acumate-disable-file all -->\n{}", MARKUP);
        assert!(context
            .validate_markup_file(&markup_path, Some(&file_wide))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_markup_without_source_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let markup_path = dir.path().join("SO301000.html");
        fs::write(&markup_path, MARKUP).unwrap();
        let context = ValidationContext::offline(EngineConfig::default());
        assert!(context.validate_markup_file(&markup_path, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_feature_disabled_screen_is_silent() {
        let markup = r#"<qp-fieldset view.bind="Document"><field name="Nope"></field></qp-fieldset>"#;
        let dir = screen_dir(GATED_SOURCE, markup);
        let markup_path = dir.path().join("SO301000.html");

        let disabled = with_client(StaticClient {
            features: Some(vec![FeatureModel {
                feature_name: "px.objects.cs.featuresset+inventory ".to_string(),
                enabled: false,
            }]),
            ..StaticClient::default()
        });
        assert!(disabled.validate_markup_file(&markup_path, None).await.is_empty());

        // Features the backend does not report count as enabled.
        let unknown = with_client(StaticClient {
            features: Some(Vec::new()),
            ..StaticClient::default()
        });
        assert_eq!(
            codes(&unknown.validate_markup_file(&markup_path, None).await),
            vec![FIELD_NOT_FOUND]
        );
    }

    #[tokio::test]
    async fn test_disabled_screen_beside_enabled_one() {
        let source = r#"@graphInfo({ graphType: "PX.Objects.IN.INReceiptEntry" })
@featureInstalled("PX.Objects.CS.FeaturesSet+Inventory")
export class IN301000 extends PXScreen {
    Receipt = createSingle(INRegister);
}

@graphInfo({ graphType: "PX.Objects.IN.INIssueEntry" })
export class IN301001 extends PXScreen {
    Issue = createSingle(INIssue);
}

export class INRegister extends PXView {
    RefNbr: PXFieldState;
}

export class INIssue extends PXView {
    RefNbr: PXFieldState;
}
"#;
        let markup = r#"<qp-fieldset view.bind="Receipt"><field name="Missing"></field></qp-fieldset>
<qp-button state.bind="Nope"></qp-button>"#;
        let dir = screen_dir(source, markup);
        let markup_path = dir.path().join("SO301000.html");

        let disabled = with_client(StaticClient {
            features: Some(vec![FeatureModel {
                feature_name: "PX.Objects.CS.FeaturesSet+Inventory".to_string(),
                enabled: false,
            }]),
            ..StaticClient::default()
        });
        let diagnostics = disabled.validate_markup_file(&markup_path, None).await;
        assert_eq!(codes(&diagnostics), vec![ACTION_NOT_FOUND]);
        assert!(diagnostics[0].related_class.is_none());
        assert!(diagnostics[0].screen.is_none());

        let enabled = with_client(StaticClient {
            features: Some(Vec::new()),
            ..StaticClient::default()
        });
        let diagnostics = enabled.validate_markup_file(&markup_path, None).await;
        assert_eq!(codes(&diagnostics), vec![FIELD_NOT_FOUND, ACTION_NOT_FOUND]);
        assert_eq!(diagnostics[0].related_class.as_deref(), Some("INRegister"));
        assert_eq!(diagnostics[0].screen.as_deref(), Some("IN301000"));
    }

    #[tokio::test]
    async fn test_markup_backend_field_check() {
        let markup = r#"<qp-fieldset view.bind="Document"><field name="Status"></field></qp-fieldset>"#;
        let dir = screen_dir(SOURCE, markup);
        let markup_path = dir.path().join("SO301000.html");

        let client: StaticClient = serde_json::from_value(serde_json::json!({
            "structures": {
                "PX.Objects.SO.SOOrderEntry": {
                    "views": { "Document": { "fields": { "OrderNbr": {} } } }
                }
            }
        }))
        .unwrap();
        let diagnostics = with_client(client)
            .validate_markup_file(&markup_path, None)
            .await;
        assert_eq!(codes(&diagnostics), vec![BACKEND_FIELD_MISSING]);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn test_source_pass_reports_unknown_graph() {
        let dir = screen_dir(SOURCE, MARKUP);
        let source_path = dir.path().join("SO301000.ts");

        let context = with_client(StaticClient {
            graphs: graphs(&["PX.Objects.AR.CustomerMaint"]),
            ..StaticClient::default()
        });
        let diagnostics = context.validate_source_file(&source_path, None).await;
        assert_eq!(codes(&diagnostics), vec![GRAPH_TYPE_NOT_FOUND]);
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(diagnostics[0].range.start.line, 0);

        let known = with_client(StaticClient {
            graphs: graphs(&[" px.objects.so.soorderentry"]),
            ..StaticClient::default()
        });
        assert!(known.validate_source_file(&source_path, None).await.is_empty());

        let suppressed = format!("// acumate-disable-next-line graph-type-not-found\n{}", SOURCE);
        assert!(context
            .validate_source_file(&source_path, Some(&suppressed))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_offline_source_pass_is_silent() {
        let dir = screen_dir(SOURCE, MARKUP);
        let context = ValidationContext::offline(EngineConfig::default());
        assert!(context
            .validate_source_file(&dir.path().join("SO301000.ts"), None)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_validate_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let screens = dir.path().join("screens/SO/SO301000");
        fs::create_dir_all(&screens).unwrap();
        fs::write(screens.join("SO301000.ts"), SOURCE).unwrap();
        fs::write(screens.join("SO301000.html"), MARKUP).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a screen").unwrap();

        let context = ValidationContext::offline(EngineConfig::default());
        let reports = validate_workspace(&context, dir.path()).await;
        let summary: Vec<_> = reports
            .iter()
            .map(|r| (r.kind, codes(&r.diagnostics)))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ScreenFileKind::Markup, vec![FIELD_NOT_FOUND, ACTION_NOT_FOUND]),
                (ScreenFileKind::Source, vec![]),
            ]
        );
        assert_eq!(
            reports[0].path.file_name().and_then(|n| n.to_str()),
            Some("SO301000.html")
        );
    }

    #[test]
    fn test_unreadable_file_is_empty() {
        let context = ValidationContext::offline(EngineConfig::default());
        let missing = Path::new("/no/such/dir/SO301000.html");
        let diagnostics =
            futures::executor::block_on(context.validate_markup_file(missing, None));
        assert!(diagnostics.is_empty());
    }
}
