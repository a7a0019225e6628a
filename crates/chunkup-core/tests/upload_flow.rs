//! Integration test: chunked upload through `UploadService` on a real storage
//! root, including restart, resume and concurrent submits.

use std::sync::Arc;

use chunkup_core::checksum::{digest_bytes, HashAlgorithm};
use chunkup_core::hash::{ContentHash, StoredFilename};
use chunkup_core::session::{QueryParams, SessionState, SubmitFields, SubmitOutcome};
use chunkup_core::{ServiceSettings, UploadService};
use tempfile::tempdir;

const CHUNK: usize = 1024;

fn body(len: usize) -> Vec<u8> {
    (0u8..251).cycle().take(len).collect()
}

fn fields(hash: &str, filename: &str, index: usize, total: usize, data: &[u8]) -> SubmitFields {
    SubmitFields {
        file: Some(data.to_vec()),
        hash: Some(hash.to_string()),
        filename: Some(filename.to_string()),
        chunk_index: Some(index.to_string()),
        chunks: Some(total.to_string()),
    }
}

/// Indices 0..n visited in a fixed scrambled order (n must not be a multiple of 7).
fn scrambled(n: usize) -> Vec<usize> {
    (0..n).map(|i| (i * 7 + 3) % n).collect()
}

#[tokio::test]
async fn out_of_order_upload_commits_and_survives_restart() {
    let root = tempdir().unwrap();
    let data = body(10 * CHUNK + 17);
    let hash = digest_bytes(&data, HashAlgorithm::Md5);
    let parts: Vec<&[u8]> = data.chunks(CHUNK).collect();
    let total = parts.len();

    let svc = UploadService::open_at(root.path(), ServiceSettings::default())
        .await
        .unwrap();
    let mut last = None;
    for i in scrambled(total) {
        let req = fields(&hash, "video.mp4", i, total, parts[i]).parse().unwrap();
        last = Some(svc.submit_chunk(req).await.unwrap());
    }
    assert_eq!(
        last,
        Some(SubmitOutcome::Complete {
            url: "/files/complete/video.mp4".into(),
            deduplicated: false,
        })
    );
    let stored = std::fs::read(root.path().join("complete").join("video.mp4")).unwrap();
    assert_eq!(stored, data);
    svc.index().close().await;
    drop(svc);

    // A fresh process answers from the persisted index.
    let svc = UploadService::open_at(root.path(), ServiceSettings::default())
        .await
        .unwrap();
    let query = QueryParams {
        hash: Some(hash.clone()),
        filename: Some("video.mp4".into()),
        chunk_index: None,
    }
    .parse()
    .unwrap();
    let resp = serde_json::to_value(svc.query(&query).await.unwrap()).unwrap();
    assert_eq!(
        resp,
        serde_json::json!({ "exists": true, "url": "/files/complete/video.mp4" })
    );
}

#[tokio::test]
async fn interrupted_upload_resumes_after_restart() {
    let root = tempdir().unwrap();
    let data = body(4 * CHUNK);
    let hash = digest_bytes(&data, HashAlgorithm::Md5);
    let parts: Vec<&[u8]> = data.chunks(CHUNK).collect();

    let svc = UploadService::open_at(root.path(), ServiceSettings::default())
        .await
        .unwrap();
    for i in [0, 2] {
        let req = fields(&hash, "doc.pdf", i, 4, parts[i]).parse().unwrap();
        svc.submit_chunk(req).await.unwrap();
    }
    svc.index().close().await;
    drop(svc);

    let svc = UploadService::open_at(root.path(), ServiceSettings::default())
        .await
        .unwrap();
    let sessions = svc.recover().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].state, SessionState::Accumulating { received: vec![0, 2] });

    let query = QueryParams {
        hash: Some(hash.clone()),
        filename: Some("doc.pdf".into()),
        chunk_index: None,
    }
    .parse()
    .unwrap();
    let resp = serde_json::to_value(svc.query(&query).await.unwrap()).unwrap();
    assert_eq!(resp, serde_json::json!({ "exists": false, "uploadedChunks": [0, 2] }));

    for i in [1, 3] {
        let req = fields(&hash, "doc.pdf", i, 4, parts[i]).parse().unwrap();
        svc.submit_chunk(req).await.unwrap();
    }
    assert_eq!(
        std::fs::read(root.path().join("complete").join("doc.pdf")).unwrap(),
        data
    );
}

#[tokio::test]
async fn concurrent_chunks_of_one_session_commit_exactly_once() {
    let root = tempdir().unwrap();
    let data = body(8 * CHUNK);
    let hash = digest_bytes(&data, HashAlgorithm::Md5);
    let total = 8;
    let svc = Arc::new(
        UploadService::open_at(root.path(), ServiceSettings::default())
            .await
            .unwrap(),
    );

    let mut tasks = Vec::new();
    // Every chunk twice, so several submits may observe completion.
    for _ in 0..2 {
        for (i, part) in data.chunks(CHUNK).enumerate() {
            let svc = Arc::clone(&svc);
            let req = fields(&hash, "race.bin", i, total, part).parse().unwrap();
            tasks.push(tokio::spawn(async move { svc.submit_chunk(req).await }));
        }
    }
    let mut committed = 0;
    for t in tasks {
        if let SubmitOutcome::Complete { deduplicated: false, .. } = t.await.unwrap().unwrap() {
            committed += 1;
        }
    }
    assert_eq!(committed, 1);

    let stored = std::fs::read(root.path().join("complete").join("race.bin")).unwrap();
    assert_eq!(stored, data);
    // Late duplicates see the index entry and write nothing.
    let h = ContentHash::parse(&hash).unwrap();
    assert!(!svc.chunks().session_dir(&h).exists());
    assert!(svc.recover().await.unwrap().is_empty());
}

#[tokio::test]
async fn independent_sessions_complete_in_parallel() {
    let root = tempdir().unwrap();
    let svc = Arc::new(
        UploadService::open_at(root.path(), ServiceSettings::default())
            .await
            .unwrap(),
    );

    let mut tasks = Vec::new();
    for n in 0..4usize {
        let svc = Arc::clone(&svc);
        tasks.push(tokio::spawn(async move {
            let data = body(3 * CHUNK + n);
            let hash = digest_bytes(&data, HashAlgorithm::Md5);
            let name = format!("file-{n}.bin");
            let parts: Vec<&[u8]> = data.chunks(CHUNK).collect();
            let total = parts.len();
            let mut last = None;
            for (i, part) in parts.iter().enumerate().rev() {
                let req = fields(&hash, &name, i, total, part).parse().unwrap();
                last = Some(svc.submit_chunk(req).await.unwrap());
            }
            (name, data, last)
        }));
    }
    for t in tasks {
        let (name, data, last) = t.await.unwrap();
        assert!(last.unwrap().is_complete());
        assert_eq!(std::fs::read(root.path().join("complete").join(&name)).unwrap(), data);
    }
    assert_eq!(svc.index().list().await.unwrap().len(), 4);
}

#[tokio::test]
async fn sha256_mode_verifies_with_sha256() {
    let root = tempdir().unwrap();
    let settings = ServiceSettings {
        hash_algorithm: HashAlgorithm::Sha256,
        ..ServiceSettings::default()
    };
    let svc = UploadService::open_at(root.path(), settings).await.unwrap();
    let data = body(2 * CHUNK);
    let md5 = digest_bytes(&data, HashAlgorithm::Md5);
    let sha = digest_bytes(&data, HashAlgorithm::Sha256);

    // An MD5 claim no longer verifies.
    let parts: Vec<&[u8]> = data.chunks(CHUNK).collect();
    svc.submit_chunk(fields(&md5, "a.bin", 0, 2, parts[0]).parse().unwrap())
        .await
        .unwrap();
    let err = svc
        .submit_chunk(fields(&md5, "a.bin", 1, 2, parts[1]).parse().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    for (i, part) in parts.iter().enumerate() {
        svc.submit_chunk(fields(&sha, "a.bin", i, 2, part).parse().unwrap())
            .await
            .unwrap();
    }
    let name = StoredFilename::parse("a.bin").unwrap();
    assert_eq!(std::fs::read(svc.layout().artifact_path(&name)).unwrap(), data);
}
