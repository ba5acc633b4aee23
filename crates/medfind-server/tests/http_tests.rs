//! End-to-end tests for the HTTP API over a real listener.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use medfind_core::embedding::{
    EmbeddingCache, EmbeddingProvider, ProviderError, ProviderResult,
};
use medfind_core::models::{GeoPoint, InventoryItem, MedicineRecord, Pharmacy};
use medfind_core::resolver::{Resolver, ResolverConfig, SearchIndex, SharedIndex};
use medfind_core::{Catalog, SqlitePharmacyStore};
use medfind_server::http::{ALTERNATIVES_MESSAGE, NOT_FOUND_MESSAGE};
use medfind_server::{router, AppState};
use serde_json::Value;

/// Provider with a fixed vocabulary; anything else fails.
struct VocabProvider(HashMap<&'static str, Vec<f32>>);

#[async_trait]
impl EmbeddingProvider for VocabProvider {
    fn model(&self) -> &str {
        "vocab"
    }

    async fn embed(&self, input: &str) -> ProviderResult<Vec<f32>> {
        self.0
            .get(input)
            .cloned()
            .ok_or(ProviderError::Timeout)
    }
}

struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
    _dir: tempfile::TempDir,
}

impl TestServer {
    async fn start(vocab: HashMap<&'static str, Vec<f32>>) -> Self {
        let dir = tempfile::tempdir().unwrap();

        let store = SqlitePharmacyStore::open_in_memory().unwrap();
        let mut pharmacy = Pharmacy::new(
            "Connaught Place Chemists".into(),
            GeoPoint::new(28.6150, 77.2100),
        );
        pharmacy.phone = Some("+91 11 2334 5678".into());
        store
            .seed_pharmacy(
                &pharmacy,
                &[InventoryItem {
                    medicine: "Paracetamol 500mg".into(),
                    quantity: 10,
                    price: Some(18.5),
                }],
            )
            .unwrap();

        let cache = EmbeddingCache::open(
            dir.path().join("embeddings_cache.json"),
            Arc::new(VocabProvider(vocab)),
        );
        cache.insert("paracetamol", vec![1.0, 0.0]).await.unwrap();
        cache.insert("cetirizine", vec![0.0, 1.0]).await.unwrap();

        let catalog = Catalog::from_records([
            MedicineRecord::new("paracetamol").with_substitutes(["Crocin", "Dolo 650"]),
            MedicineRecord::new("ibuprofen"),
            MedicineRecord::new("cetirizine"),
        ]);
        let index = SharedIndex::new(SearchIndex::build(catalog, 0.3));

        let resolver = Resolver::new(Arc::new(store), cache, ResolverConfig::default())
            .with_index(index);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(AppState::new(resolver)))
                .await
                .unwrap();
        });

        Self {
            addr,
            client: reqwest::Client::new(),
            _dir: dir,
        }
    }

    async fn get(&self, path_and_query: &str) -> (u16, Value) {
        let response = self
            .client
            .get(format!("http://{}{}", self.addr, path_and_query))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }
}

fn vocab() -> HashMap<&'static str, Vec<f32>> {
    HashMap::from([("xyznomed", vec![0.9, 0.1])])
}

#[tokio::test]
async fn test_search_inventory_hit() {
    let server = TestServer::start(vocab()).await;

    let (status, body) = server
        .get("/search?query=paracetamol&lat=28.6139&lng=77.2090")
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["found"], true);
    assert_eq!(body["tier"], "inventory");
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0]["distance"].as_f64().unwrap() < 1000.0);
    assert_eq!(results[0]["pharmacy"]["name"], "Connaught Place Chemists");
    assert_eq!(results[0]["items"][0]["medicine"], "paracetamol 500mg");
}

#[tokio::test]
async fn test_search_fuzzy_alternatives() {
    let server = TestServer::start(vocab()).await;

    let (status, body) = server
        .get("/search?query=paracetmol&lat=28.6139&lng=77.2090")
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["found"], false);
    assert_eq!(body["tier"], "fuzzy");
    assert_eq!(body["message"], ALTERNATIVES_MESSAGE);
    assert_eq!(body["suggestions"][0]["name"], "paracetamol");
    assert_eq!(body["suggestions"][0]["substitutes"][1], "Dolo 650");
    assert!(body.get("results").is_none());
}

#[tokio::test]
async fn test_search_semantic_alternatives() {
    let server = TestServer::start(vocab()).await;

    let (status, body) = server.get("/search?query=xyznomed").await;

    assert_eq!(status, 200);
    assert_eq!(body["tier"], "semantic");
    let suggestions = body["suggestions"].as_array().unwrap();
    assert_eq!(suggestions[0]["name"], "paracetamol");
    let first = suggestions[0]["similarity"].as_f64().unwrap();
    let second = suggestions[1]["similarity"].as_f64().unwrap();
    assert!(first >= second);
}

#[tokio::test]
async fn test_search_nothing_found_is_404() {
    let server = TestServer::start(HashMap::new()).await;

    let (status, body) = server
        .get("/search?query=xyznomed&lat=28.6139&lng=77.2090")
        .await;

    assert_eq!(status, 404);
    assert_eq!(body["found"], false);
    assert_eq!(body["tier"], "none");
    assert_eq!(body["message"], NOT_FOUND_MESSAGE);
    assert_eq!(body["suggestions"], serde_json::json!([]));
}

#[tokio::test]
async fn test_search_bad_input_is_400() {
    let server = TestServer::start(vocab()).await;

    for path in [
        "/search",
        "/search?query=%20%20",
        "/search?query=paracetamol&lat=north&lng=77.2",
        "/search?query=paracetamol&lat=95&lng=77.2",
        "/search?query=paracetamol&lat=28.6&lng=200",
    ] {
        let (status, body) = server.get(path).await;
        assert_eq!(status, 400, "{}", path);
        assert!(body["message"].as_str().is_some(), "{}", path);
    }
}

#[tokio::test]
async fn test_search_single_coordinate_is_ignored() {
    let server = TestServer::start(vocab()).await;

    let (status, body) = server.get("/search?query=paracetamol&lat=28.6139").await;

    assert_eq!(status, 200);
    assert_eq!(body["tier"], "inventory");
    assert!(body["results"][0].get("distance").is_none());
}

#[tokio::test]
async fn test_suggest() {
    let server = TestServer::start(HashMap::new()).await;

    let (status, body) = server.get("/suggest?query=ibuprofn").await;
    assert_eq!(status, 200);
    assert_eq!(body["tier"], "fuzzy");
    assert_eq!(body["suggestions"][0]["name"], "ibuprofen");

    let (status, body) = server.get("/suggest?query=qqqqzzzz").await;
    assert_eq!(status, 200);
    assert_eq!(body["suggestions"], serde_json::json!([]));
    assert_eq!(body["message"], "No medicine found for \"qqqqzzzz\".");

    let (status, _) = server.get("/suggest").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_pharmacy_search() {
    let server = TestServer::start(vocab()).await;

    let (status, body) = server
        .get("/pharmacy/search?medicine=Paracetamol%20500mg&lat=28.6139&lng=77.2090")
        .await;
    assert_eq!(status, 200);
    let pharmacies = body["pharmacies"].as_array().unwrap();
    assert_eq!(pharmacies.len(), 1);
    assert_eq!(pharmacies[0]["stock"], 10);
    assert_eq!(pharmacies[0]["phone"], "+91 11 2334 5678");
    assert_eq!(pharmacies[0]["location"]["lat"], 28.6150);

    let (status, body) = server.get("/pharmacy/search?medicine=paracetamol").await;
    assert_eq!(status, 200);
    assert_eq!(body["pharmacies"], serde_json::json!([]));

    let (status, _) = server.get("/pharmacy/search").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start(vocab()).await;

    let (status, body) = server.get("/health").await;

    assert_eq!(status, 200);
    assert_eq!(body["ok"], true);
    assert_eq!(body["catalogReady"], true);
    assert_eq!(body["medicines"], 3);
    assert_eq!(body["cachedEmbeddings"], 2);
}
