use std::sync::Arc;

use recordindex::client::TestSolr;
use recordindex::{
    CreateCollectionOutcome, DeleteCollectionOutcome, IndexerConfig, IndexerService,
    UpdateSchemaError,
};
use recordindex_types::{
    CollectionConfig, FieldType, IndexDocument, Schema, SchemaField, FIELD_ID, FIELD_VERSION,
};

fn service(solr: &TestSolr, tenant_domain: Option<&str>) -> IndexerService {
    let mut config = IndexerConfig::new("http://localhost:8983/solr");
    config.tenant_domain = tenant_domain.map(str::to_string);
    IndexerService::with_connector(config, Arc::new(solr.clone()))
}

fn field(name: &str, field_type: FieldType) -> SchemaField {
    SchemaField::new(name, field_type)
        .with_indexed(true)
        .with_stored(true)
}

#[tokio::test]
#[test_log::test]
async fn test_create_replace_schema_and_delete() {
    let solr = TestSolr::new();
    let service = service(&solr, None);
    let config = CollectionConfig::builder()
        .collection_name("T1")
        .shards(2)
        .replicas(1)
        .build()
        .unwrap();

    assert_eq!(
        service.create_collection(&config).await.unwrap(),
        CreateCollectionOutcome::Created
    );
    assert!(service.collection_exists("T1").await.unwrap());
    assert!(service.collection_config_exists("T1").await.unwrap());

    let desired = Schema::with_fields([
        field("IntField", FieldType::Int),
        field("LongField", FieldType::Long),
    ]);
    service.update_schema("T1", &desired, false).await.unwrap();

    let schema = service.get_schema("T1").await.unwrap();
    assert_eq!(schema.unique_key(), FIELD_ID);
    assert_eq!(
        schema.field_names().collect::<Vec<_>>(),
        vec!["IntField", "LongField"]
    );

    // The cluster kept the protected fields next to the new ones.
    service.invalidate_schema("T1").await;
    let remote = service.get_schema("T1").await.unwrap();
    let mut names = remote.field_names().collect::<Vec<_>>();
    names.sort();
    assert_eq!(names, vec!["IntField", "LongField", FIELD_VERSION, FIELD_ID]);

    assert_eq!(
        service.delete_collection("T1").await.unwrap(),
        DeleteCollectionOutcome::Deleted
    );
    assert!(!service.collection_exists("T1").await.unwrap());
    assert!(!service.collection_config_exists("T1").await.unwrap());
    assert_eq!(
        service.delete_collection("T1").await.unwrap(),
        DeleteCollectionOutcome::NotFound
    );
    assert!(matches!(
        service.update_schema("T1", &desired, true).await,
        Err(UpdateSchemaError::SchemaNotFound(_))
    ));

    service.destroy().await.unwrap();
}

#[tokio::test]
#[test_log::test]
async fn test_create_is_idempotent_and_merge_accumulates() {
    let solr = TestSolr::new();
    let service = service(&solr, None);
    let config = CollectionConfig::builder()
        .collection_name("orders")
        .schema(Schema::with_fields([field("total", FieldType::Double)]))
        .build()
        .unwrap();

    assert_eq!(
        service.ensure_table_index(&config).await.unwrap(),
        CreateCollectionOutcome::Created
    );
    assert_eq!(
        service.ensure_table_index(&config).await.unwrap(),
        CreateCollectionOutcome::AlreadyExisted
    );
    assert_eq!(solr.collection_names(), vec!["DEFAULT_orders".to_string()]);

    service
        .update_schema(
            "orders",
            &Schema::with_fields([field("symbol", FieldType::String)]),
            true,
        )
        .await
        .unwrap();
    let schema = service.get_schema("orders").await.unwrap();
    assert!(schema.contains_field("total"));
    assert!(schema.contains_field("symbol"));
    assert!(schema.contains_field(FIELD_ID));

    service.invalidate_schema("orders").await;
    assert_eq!(service.get_schema("orders").await.unwrap(), schema);
}

#[tokio::test]
#[test_log::test]
async fn test_tenant_domains_do_not_share_collections() {
    let acme_solr = TestSolr::with_naming(recordindex_types::NamingPolicy::new("acme"));
    let acme = service(&acme_solr, Some("acme"));
    let config = CollectionConfig::builder()
        .collection_name("orders")
        .build()
        .unwrap();

    acme.create_collection(&config).await.unwrap();
    assert!(acme_solr.has_collection("ACME_orders"));

    let globex = service(&acme_solr, Some("globex"));
    assert!(!globex.collection_exists("orders").await.unwrap());
    assert_eq!(
        globex.create_collection(&config).await.unwrap(),
        CreateCollectionOutcome::Created
    );
    assert_eq!(
        acme_solr.collection_names(),
        vec!["ACME_orders".to_string(), "GLOBEX_orders".to_string()]
    );
}

#[tokio::test]
#[test_log::test]
async fn test_documents_survive_schema_merge() {
    let solr = TestSolr::new();
    let service = service(&solr, None);
    let config = CollectionConfig::builder()
        .collection_name("orders")
        .schema(Schema::with_fields([field("status", FieldType::String)]))
        .build()
        .unwrap();
    service.ensure_table_index(&config).await.unwrap();

    let docs = vec![
        IndexDocument::new()
            .with_field("id", "1")
            .with_field("status", "open"),
        IndexDocument::new()
            .with_field("id", "2")
            .with_field("status", "closed"),
    ];
    service.index_documents("orders", &docs).await.unwrap();

    service
        .update_schema(
            "orders",
            &Schema::with_fields([field("total", FieldType::Double)]),
            true,
        )
        .await
        .unwrap();
    assert_eq!(solr.documents("orders"), docs);

    service
        .delete_documents_by_query("orders", "status:closed")
        .await
        .unwrap();
    assert_eq!(solr.documents("orders"), vec![docs[0].clone()]);
}
