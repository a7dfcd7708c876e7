//! Device discovery: keeps an identifier → descriptor map in step with the
//! browser's worker-thread events.

use crate::bridge::lock;
use crate::device::{BrowseEvent, BrowseListener, DeviceBrowser, DeviceDescriptor};
use crate::error::{Result, TrackerError};
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub type DeviceMap = BTreeMap<String, DeviceDescriptor>;

/// Apply one browser event to the map.
pub fn apply_event(devices: &mut DeviceMap, event: BrowseEvent) {
    match event {
        BrowseEvent::Found(descriptor) => {
            devices.insert(descriptor.product_id.clone(), descriptor);
        }
        BrowseEvent::Lost(descriptor) => {
            if devices.remove(&descriptor.product_id).is_none() {
                debug!("lost unknown eye tracker {}", descriptor.product_id);
            }
        }
        BrowseEvent::Updated(descriptor) => {
            devices.remove(&descriptor.product_id);
            devices.insert(descriptor.product_id.clone(), descriptor);
        }
    }
}

pub struct DeviceDiscovery {
    browser: Arc<dyn DeviceBrowser>,
    devices: Arc<Mutex<DeviceMap>>,
    poll_interval: Duration,
    browsing: bool,
}

impl DeviceDiscovery {
    pub fn new(browser: Arc<dyn DeviceBrowser>, poll_interval: Duration) -> Self {
        Self {
            browser,
            devices: Arc::new(Mutex::new(DeviceMap::new())),
            poll_interval,
            browsing: false,
        }
    }

    pub fn start_browsing(&mut self) {
        if self.browsing {
            return;
        }
        let devices = Arc::clone(&self.devices);
        let listener: BrowseListener = Arc::new(move |event: BrowseEvent| {
            debug!("browser event: {:?}", event);
            apply_event(&mut lock(&devices), event);
        });
        self.browser.start(listener);
        self.browsing = true;
        info!("Browsing for eye trackers");
    }

    pub fn stop_browsing(&mut self) {
        if self.browsing {
            self.browser.stop();
            self.browsing = false;
        }
    }

    pub fn is_browsing(&self) -> bool {
        self.browsing
    }

    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        lock(&self.devices).values().cloned().collect()
    }

    pub fn get(&self, product_id: &str) -> Option<DeviceDescriptor> {
        lock(&self.devices).get(product_id).cloned()
    }

    /// Poll until at least one device is known or `timeout` elapses.
    pub fn wait_for_device(&self, timeout: Duration) -> Result<Vec<DeviceDescriptor>> {
        let deadline = Instant::now() + timeout;
        loop {
            let devices = self.devices();
            if !devices.is_empty() {
                return Ok(devices);
            }
            if Instant::now() >= deadline {
                return Err(TrackerError::DeviceNotFound);
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}

impl Drop for DeviceDiscovery {
    fn drop(&mut self) {
        self.stop_browsing();
    }
}
