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

//! Integration tests for the feed distribution outbox.

use chrono::{Duration, Utc};
use uuid::Uuid;

use haven_storage::{NewFeedOutboxItem, DAL};

use crate::fixtures::{test_fixture, unique_tenant};

fn feed_item(recipient: &str) -> NewFeedOutboxItem {
    NewFeedOutboxItem {
        file_id: Uuid::new_v4(),
        drive_id: Uuid::new_v4(),
        recipient: recipient.to_string(),
        value: Some(serde_json::to_vec(&serde_json::json!({"kind": "feed"})).unwrap()),
    }
}

#[tokio::test]
async fn test_pop_in_insertion_order() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();

    let mut file_ids = Vec::new();
    for _ in 0..4 {
        let item = feed_item("rosie.example.com");
        file_ids.push(item.file_id);
        dal.feed_outbox(&tenant).insert(item).await.unwrap();
    }

    let popped = dal.feed_outbox(&tenant).pop(3).await.unwrap();
    assert_eq!(popped.len(), 3);
    let popped_ids: Vec<Uuid> = popped.iter().map(|item| item.file_id).collect();
    assert_eq!(popped_ids, file_ids[..3]);

    let token = popped[0].pop_stamp.expect("Popped item must carry a stamp");
    assert!(popped.iter().all(|item| item.pop_stamp == Some(token)));
}

#[tokio::test]
async fn test_commit_list_and_commit_all() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();

    for _ in 0..3 {
        dal.feed_outbox(&tenant)
            .insert(feed_item("hamfast.example.com"))
            .await
            .unwrap();
    }

    let popped = dal.feed_outbox(&tenant).pop(3).await.unwrap();
    let token = popped[0].pop_stamp.unwrap();

    let removed = dal
        .feed_outbox(&tenant)
        .pop_commit_list(token, &[popped[1].file_id])
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let removed = dal.feed_outbox(&tenant).pop_commit_all(token).await.unwrap();
    assert_eq!(removed, 2);

    let status = dal.feed_outbox(&tenant).pop_status().await.unwrap();
    assert_eq!(status.total_items, 0);
}

#[tokio::test]
async fn test_partial_cancel_releases_only_listed() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();

    for _ in 0..3 {
        dal.feed_outbox(&tenant)
            .insert(feed_item("bilbo.example.com"))
            .await
            .unwrap();
    }

    let popped = dal.feed_outbox(&tenant).pop(3).await.unwrap();
    let token = popped[0].pop_stamp.unwrap();

    let returned = dal
        .feed_outbox(&tenant)
        .pop_cancel_list(token, &[popped[1].file_id])
        .await
        .unwrap();
    assert_eq!(returned, 1);

    // The released record is poppable again; the other two stay leased
    let status = dal.feed_outbox(&tenant).pop_status().await.unwrap();
    assert_eq!(status.total_items, 3);
    assert_eq!(status.popped_items, 2);

    let again = dal.feed_outbox(&tenant).pop(10).await.unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].file_id, popped[1].file_id);

    // The empty-list variant is a no-op
    assert_eq!(
        dal.feed_outbox(&tenant)
            .pop_cancel_list(token, &[])
            .await
            .unwrap(),
        0
    );

    let removed = dal.feed_outbox(&tenant).pop_commit_all(token).await.unwrap();
    assert_eq!(removed, 2);
}

#[tokio::test]
async fn test_cancel_restores_availability() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();

    for _ in 0..2 {
        dal.feed_outbox(&tenant)
            .insert(feed_item("lobelia.example.com"))
            .await
            .unwrap();
    }

    let popped = dal.feed_outbox(&tenant).pop(2).await.unwrap();
    let token = popped[0].pop_stamp.unwrap();

    // Nothing left to pop while leased
    assert!(dal.feed_outbox(&tenant).pop(2).await.unwrap().is_empty());

    let returned = dal.feed_outbox(&tenant).pop_cancel_all(token).await.unwrap();
    assert_eq!(returned, 2);

    let again = dal.feed_outbox(&tenant).pop(2).await.unwrap();
    assert_eq!(again.len(), 2);
}

#[tokio::test]
async fn test_recover_dead_pops() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let tenant = unique_tenant();

    dal.feed_outbox(&tenant)
        .insert(feed_item("lotho.example.com"))
        .await
        .unwrap();
    dal.feed_outbox(&tenant).pop(1).await.unwrap();

    let boundary = Utc::now() + Duration::seconds(5);
    assert_eq!(
        dal.feed_outbox(&tenant)
            .pop_recover_dead(boundary)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        dal.feed_outbox(&tenant)
            .pop_recover_dead(Utc::now() - Duration::minutes(10))
            .await
            .unwrap(),
        0
    );

    assert_eq!(dal.feed_outbox(&tenant).pop(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_pop_zero_and_tenant_isolation() {
    let fixture = test_fixture().await;
    let dal = DAL::new(fixture.database());
    let alpha = unique_tenant();
    let beta = unique_tenant();

    dal.feed_outbox(&alpha)
        .insert(feed_item("ted.example.com"))
        .await
        .unwrap();

    assert!(dal.feed_outbox(&alpha).pop(0).await.unwrap().is_empty());
    assert!(dal.feed_outbox(&beta).pop(10).await.unwrap().is_empty());

    let status = dal.feed_outbox(&beta).pop_status().await.unwrap();
    assert_eq!(status.total_items, 0);
    assert!(status.oldest_item_time.is_none());
}
