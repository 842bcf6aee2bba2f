/*
 *  Copyright 2026 Haven Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Integration tests for the inbox queue: insertion-order batched pops,
//! box partitioning, commit/cancel symmetry and dead-pop recovery.

use chrono::{Duration, Utc};
use uuid::Uuid;

use haven_storage::{NewInboxItem, StorageError, DAL, MAX_VALUE_BYTES};

use crate::fixtures::{inbox_item, test_fixture, unique_tenant};

#[tokio::test]
async fn test_pop_commit_leaves_remainder() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();
    let box_id = Uuid::new_v4();

    let mut file_ids = Vec::new();
    for _ in 0..3 {
        let item = inbox_item(box_id);
        file_ids.push(item.file_id);
        dal.inbox(&tenant).insert(item).await.unwrap();
    }

    // Oldest two come back, in insertion order
    let popped = dal.inbox(&tenant).pop_specific_box(box_id, 2).await.unwrap();
    assert_eq!(popped.len(), 2);
    assert_eq!(popped[0].file_id, file_ids[0]);
    assert_eq!(popped[1].file_id, file_ids[1]);
    let token = popped[0].pop_stamp.expect("Popped item must carry a stamp");
    assert_eq!(popped[1].pop_stamp, Some(token));

    let removed = dal.inbox(&tenant).pop_commit_all(token).await.unwrap();
    assert_eq!(removed, 2);

    let status = dal.inbox(&tenant).pop_status().await.unwrap();
    assert_eq!(status.total_items, 1);
    assert_eq!(status.popped_items, 0);

    let remaining = dal.inbox(&tenant).pop_specific_box(box_id, 10).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].file_id, file_ids[2]);
}

#[tokio::test]
async fn test_pop_respects_box_partition() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();
    let box_a = Uuid::new_v4();
    let box_b = Uuid::new_v4();

    dal.inbox(&tenant).insert(inbox_item(box_a)).await.unwrap();
    dal.inbox(&tenant).insert(inbox_item(box_b)).await.unwrap();
    dal.inbox(&tenant).insert(inbox_item(box_a)).await.unwrap();

    let popped = dal.inbox(&tenant).pop_specific_box(box_a, 10).await.unwrap();
    assert_eq!(popped.len(), 2);
    assert!(popped.iter().all(|item| item.box_id == box_a));

    let status_b = dal
        .inbox(&tenant)
        .pop_status_specific_box(box_b)
        .await
        .unwrap();
    assert_eq!(status_b.total_items, 1);
    assert_eq!(status_b.popped_items, 0);
}

#[tokio::test]
async fn test_pop_zero_and_empty_box() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();
    let box_id = Uuid::new_v4();

    assert!(dal
        .inbox(&tenant)
        .pop_specific_box(box_id, 0)
        .await
        .unwrap()
        .is_empty());
    assert!(dal
        .inbox(&tenant)
        .pop_specific_box(box_id, 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_cancel_all_returns_items() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();
    let box_id = Uuid::new_v4();

    for _ in 0..2 {
        dal.inbox(&tenant).insert(inbox_item(box_id)).await.unwrap();
    }

    let popped = dal.inbox(&tenant).pop_specific_box(box_id, 2).await.unwrap();
    let token = popped[0].pop_stamp.unwrap();

    let returned = dal.inbox(&tenant).pop_cancel_all(token).await.unwrap();
    assert_eq!(returned, 2);

    // Cancel does not consume or count anything
    let status = dal.inbox(&tenant).pop_status().await.unwrap();
    assert_eq!(status.total_items, 2);
    assert_eq!(status.popped_items, 0);

    let again = dal.inbox(&tenant).pop_specific_box(box_id, 2).await.unwrap();
    assert_eq!(again.len(), 2);
}

#[tokio::test]
async fn test_partial_cancel_then_commit_rest() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();
    let box_id = Uuid::new_v4();

    for _ in 0..3 {
        dal.inbox(&tenant).insert(inbox_item(box_id)).await.unwrap();
    }

    let popped = dal.inbox(&tenant).pop_specific_box(box_id, 3).await.unwrap();
    let token = popped[0].pop_stamp.unwrap();

    let returned = dal
        .inbox(&tenant)
        .pop_cancel_list(token, &[popped[0].file_id])
        .await
        .unwrap();
    assert_eq!(returned, 1);

    let removed = dal.inbox(&tenant).pop_commit_all(token).await.unwrap();
    assert_eq!(removed, 2);

    let status = dal.inbox(&tenant).pop_status().await.unwrap();
    assert_eq!(status.total_items, 1);
    assert_eq!(status.popped_items, 0);
}

#[tokio::test]
async fn test_commit_list_removes_only_listed() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();
    let box_id = Uuid::new_v4();

    for _ in 0..3 {
        dal.inbox(&tenant).insert(inbox_item(box_id)).await.unwrap();
    }

    let popped = dal.inbox(&tenant).pop_specific_box(box_id, 3).await.unwrap();
    let token = popped[0].pop_stamp.unwrap();

    let removed = dal
        .inbox(&tenant)
        .pop_commit_list(token, &[popped[0].file_id, popped[2].file_id])
        .await
        .unwrap();
    assert_eq!(removed, 2);

    // The unlisted item is still leased under the token
    let status = dal.inbox(&tenant).pop_status().await.unwrap();
    assert_eq!(status.total_items, 1);
    assert_eq!(status.popped_items, 1);

    // Empty list variants are no-ops
    assert_eq!(
        dal.inbox(&tenant).pop_commit_list(token, &[]).await.unwrap(),
        0
    );
    assert_eq!(
        dal.inbox(&tenant).pop_cancel_list(token, &[]).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_recover_dead_pops() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();
    let box_id = Uuid::new_v4();

    for _ in 0..2 {
        dal.inbox(&tenant).insert(inbox_item(box_id)).await.unwrap();
    }
    dal.inbox(&tenant).pop_specific_box(box_id, 2).await.unwrap();

    let boundary = Utc::now() + Duration::seconds(5);
    let recovered = dal.inbox(&tenant).pop_recover_dead(boundary).await.unwrap();
    assert_eq!(recovered, 2);

    // Recovered items pop again as if never touched
    let again = dal.inbox(&tenant).pop_specific_box(box_id, 2).await.unwrap();
    assert_eq!(again.len(), 2);

    // The fresh pop is younger than the boundary
    let recovered = dal.inbox(&tenant).pop_recover_dead(boundary).await.unwrap();
    assert_eq!(recovered, 0);
}

#[tokio::test]
async fn test_upsert_moves_box_and_keeps_stamp() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();
    let box_a = Uuid::new_v4();
    let box_b = Uuid::new_v4();

    let item = inbox_item(box_a);
    let file_id = item.file_id;
    dal.inbox(&tenant).insert(item).await.unwrap();

    let popped = dal.inbox(&tenant).pop_specific_box(box_a, 1).await.unwrap();
    let token = popped[0].pop_stamp.unwrap();

    dal.inbox(&tenant)
        .upsert(NewInboxItem {
            file_id,
            box_id: box_b,
            priority: 4,
            value: Some(b"moved".to_vec()),
        })
        .await
        .unwrap();

    let stored = dal
        .inbox(&tenant)
        .get(file_id)
        .await
        .unwrap()
        .expect("Item should still exist");
    assert_eq!(stored.box_id, box_b);
    assert_eq!(stored.priority, 4);
    assert_eq!(stored.pop_stamp, Some(token));
    assert!(stored.modified.is_some());
}

#[tokio::test]
async fn test_duplicate_insert_fails() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();

    let item = inbox_item(Uuid::new_v4());
    dal.inbox(&tenant).insert(item.clone()).await.unwrap();

    let result = dal.inbox(&tenant).insert(item).await;
    assert!(matches!(result, Err(StorageError::Database(_))));
}

#[tokio::test]
async fn test_oversized_payload_rejected() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();

    let mut item = inbox_item(Uuid::new_v4());
    item.value = Some(vec![0u8; MAX_VALUE_BYTES + 1]);

    let result = dal.inbox(&tenant).insert(item).await;
    assert!(matches!(
        result,
        Err(StorageError::PayloadTooLarge { .. })
    ));
}

#[tokio::test]
async fn test_status_reports_oldest_available() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();
    let box_id = Uuid::new_v4();

    let status = dal.inbox(&tenant).pop_status().await.unwrap();
    assert_eq!(status.total_items, 0);
    assert!(status.oldest_item_time.is_none());

    dal.inbox(&tenant).insert(inbox_item(box_id)).await.unwrap();
    let status = dal.inbox(&tenant).pop_status().await.unwrap();
    assert_eq!(status.total_items, 1);
    assert!(status.oldest_item_time.is_some());

    // Once everything is leased there is no available work to report
    dal.inbox(&tenant).pop_specific_box(box_id, 1).await.unwrap();
    let status = dal.inbox(&tenant).pop_status().await.unwrap();
    assert_eq!(status.popped_items, 1);
    assert!(status.oldest_item_time.is_none());
}

#[tokio::test]
async fn test_remove_by_file_id() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();
    let box_id = Uuid::new_v4();

    let item = inbox_item(box_id);
    let file_id = item.file_id;
    dal.inbox(&tenant).insert(item).await.unwrap();
    dal.inbox(&tenant).pop_specific_box(box_id, 1).await.unwrap();

    assert_eq!(dal.inbox(&tenant).remove(file_id).await.unwrap(), 1);
    assert!(dal.inbox(&tenant).get(file_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_tenant_isolation() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let alpha = unique_tenant();
    let beta = unique_tenant();
    let box_id = Uuid::new_v4();

    dal.inbox(&alpha).insert(inbox_item(box_id)).await.unwrap();

    assert!(dal
        .inbox(&beta)
        .pop_specific_box(box_id, 10)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(dal.inbox(&beta).pop_status().await.unwrap().total_items, 0);
}
