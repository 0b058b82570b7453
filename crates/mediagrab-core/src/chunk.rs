//! Chunked delivery planning for image posts.
//!
//! Transports cap a media group at ten items and throttle consecutive
//! group sends, so slideshows are partitioned into contiguous groups and
//! paced with a fixed delay. Group order preserves input order; the pacing
//! delay is a correctness requirement against the external rate limit, not
//! a courtesy.

use std::time::Duration;

use tracing::debug;

/// Maximum number of images one transport call may carry.
pub const MAX_GROUP_SIZE: usize = 10;

/// Fixed pacing delay between consecutive group sends.
pub const GROUP_PACING: Duration = Duration::from_millis(500);

/// How an image sequence should be handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageDelivery {
    /// A single image, sent as one bare item rather than a group.
    Single(String),
    /// One or more groups of at most [`MAX_GROUP_SIZE`] images each.
    Groups(Vec<Vec<String>>),
}

/// Plan the delivery of an ordered image sequence.
#[must_use]
pub fn plan_delivery(images: &[String]) -> ImageDelivery {
    if let [only] = images {
        return ImageDelivery::Single(only.clone());
    }
    ImageDelivery::Groups(chunk(images, MAX_GROUP_SIZE))
}

/// Partition `images` into contiguous groups of at most `size` items.
///
/// The last group may be smaller; concatenating the groups in order
/// reproduces the input exactly.
#[must_use]
pub fn chunk(images: &[String], size: usize) -> Vec<Vec<String>> {
    images
        .chunks(size.max(1))
        .map(<[String]>::to_vec)
        .collect()
}

/// Send `groups` strictly sequentially, sleeping [`GROUP_PACING`] between
/// consecutive sends.
///
/// The delay is inserted between groups only, never before the first or
/// after the last.
///
/// # Errors
///
/// Propagates the first error returned by `send`; remaining groups are not
/// sent.
pub async fn send_grouped<E, F, Fut>(groups: &[Vec<String>], mut send: F) -> Result<(), E>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    for (index, group) in groups.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(GROUP_PACING).await;
        }
        debug!(group = index + 1, total = groups.len(), items = group.len(), "sending image group");
        send(group.clone()).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn urls(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("https://img.example/{i}.jpg")).collect()
    }

    #[test]
    fn single_image_is_a_bare_item() {
        let images = urls(1);
        assert_eq!(plan_delivery(&images), ImageDelivery::Single(images[0].clone()));
    }

    #[test]
    fn up_to_ten_images_form_one_group() {
        for count in 2..=10 {
            let images = urls(count);
            let ImageDelivery::Groups(groups) = plan_delivery(&images) else {
                panic!("expected groups for {count} images");
            };
            assert_eq!(groups.len(), 1);
            assert_eq!(groups[0], images);
        }
    }

    #[test]
    fn twenty_three_images_split_ten_ten_three() {
        let images = urls(23);
        let groups = chunk(&images, MAX_GROUP_SIZE);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].len(), 10);
        assert_eq!(groups[1].len(), 10);
        assert_eq!(groups[2].len(), 3);
    }

    #[test]
    fn group_count_is_ceil_of_len_over_ten() {
        for count in [11, 19, 20, 21, 99, 100] {
            let groups = chunk(&urls(count), MAX_GROUP_SIZE);
            assert_eq!(groups.len(), count.div_ceil(MAX_GROUP_SIZE));
            for group in &groups[..groups.len() - 1] {
                assert_eq!(group.len(), MAX_GROUP_SIZE);
            }
        }
    }

    #[test]
    fn concatenated_groups_round_trip_in_order() {
        let images = urls(37);
        let rebuilt: Vec<String> = chunk(&images, MAX_GROUP_SIZE).concat();
        assert_eq!(rebuilt, images);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(chunk(&[], MAX_GROUP_SIZE).is_empty());
        assert_eq!(plan_delivery(&[]), ImageDelivery::Groups(Vec::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn sends_sequentially_with_pacing_gaps() {
        let images = urls(23);
        let groups = chunk(&images, MAX_GROUP_SIZE);
        let sent: Arc<Mutex<Vec<(tokio::time::Instant, usize)>>> = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&sent);
        send_grouped(&groups, move |group| {
            let log = Arc::clone(&log);
            async move {
                log.lock().expect("lock").push((tokio::time::Instant::now(), group.len()));
                Ok::<(), String>(())
            }
        })
        .await
        .expect("all groups send");

        let sent = sent.lock().expect("lock");
        assert_eq!(sent.len(), 3);
        assert_eq!(sent.iter().map(|(_, len)| *len).collect::<Vec<_>>(), vec![10, 10, 3]);
        for pair in sent.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= GROUP_PACING);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_send_failure() {
        let groups = chunk(&urls(23), MAX_GROUP_SIZE);
        let calls = Arc::new(Mutex::new(0usize));

        let counter = Arc::clone(&calls);
        let result = send_grouped(&groups, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                let mut calls = counter.lock().expect("lock");
                *calls += 1;
                if *calls == 2 { Err("transport refused".to_string()) } else { Ok(()) }
            }
        })
        .await;

        assert_eq!(result, Err("transport refused".to_string()));
        assert_eq!(*calls.lock().expect("lock"), 2);
    }
}
