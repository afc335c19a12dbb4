use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use lbsweep_compute::{ComputeApi, ComputeError};
use lbsweep_core::{
    BackendService, Firewall, ForwardingRule, GroupMember, Instance, ProxyProtocol, ResourceKind,
    ResourceRef, Scope, TargetProxy, UrlMap, Zone,
};
use parking_lot::Mutex;
use tracing::trace;

/// Operations recorded in the call log and addressable by failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListForwardingRules,
    GetForwardingRule,
    ListTargetProxies,
    GetTargetProxy,
    GetUrlMap,
    GetBackendService,
    ListGroupMembers,
    ListFirewalls,
    ListZones,
    ListInstances,
    Delete,
}

/// One recorded call: the operation and the path or name it addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub target: String,
}

#[derive(Debug, Clone)]
enum Stored {
    ForwardingRule(ForwardingRule),
    Proxy(TargetProxy),
    UrlMap(UrlMap),
    BackendService(BackendService),
    InstanceGroup(Vec<GroupMember>),
    Firewall(Firewall),
    /// Certificates and health checks; only their existence matters.
    Leaf,
}

#[derive(Debug, Default)]
struct State {
    resources: BTreeMap<ResourceRef, Stored>,
    instances: BTreeMap<String, Vec<Instance>>,
    zones: BTreeSet<String>,
    /// Injected API status codes keyed by operation and optional target.
    failures: HashMap<(Operation, Option<String>), u16>,
    calls: Vec<Call>,
    deleted: Vec<ResourceRef>,
}

/// Compute Engine backend held entirely in memory.
///
/// Objects are inserted as API-shaped models and looked up by the reference
/// parsed from their self link. Every call is appended to a log, and any
/// operation can be made to fail with an API status, optionally only for one
/// target.
#[derive(Debug)]
pub struct InMemoryCompute {
    project_id: String,
    state: Mutex<State>,
}

impl Default for InMemoryCompute {
    fn default() -> Self {
        Self::new("lbsweep-test")
    }
}

impl InMemoryCompute {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Self link the real API would report for `target` in this project.
    pub fn self_link(&self, target: &ResourceRef) -> String {
        format!(
            "https://www.googleapis.com/compute/v1/projects/{}/{}",
            self.project_id,
            target.api_path()
        )
    }

    pub fn insert_forwarding_rule(&self, target: ResourceRef, mut rule: ForwardingRule) {
        rule.self_link = self.self_link(&target);
        self.insert(target, Stored::ForwardingRule(rule));
    }

    pub fn insert_target_proxy(&self, target: ResourceRef, mut proxy: TargetProxy) {
        proxy.self_link = self.self_link(&target);
        self.insert(target, Stored::Proxy(proxy));
    }

    pub fn insert_url_map(&self, target: ResourceRef, mut url_map: UrlMap) {
        url_map.self_link = self.self_link(&target);
        self.insert(target, Stored::UrlMap(url_map));
    }

    pub fn insert_backend_service(&self, target: ResourceRef, mut service: BackendService) {
        service.self_link = self.self_link(&target);
        self.insert(target, Stored::BackendService(service));
    }

    pub fn insert_instance_group(&self, target: ResourceRef, members: Vec<GroupMember>) {
        self.insert(target, Stored::InstanceGroup(members));
    }

    pub fn insert_firewall(&self, firewall: Firewall) {
        let target = ResourceRef::global(ResourceKind::Firewall, firewall.name.clone());
        self.insert(target, Stored::Firewall(firewall));
    }

    /// Registers a certificate or health check.
    pub fn insert_leaf(&self, target: ResourceRef) {
        self.insert(target, Stored::Leaf);
    }

    pub fn add_zone(&self, zone: impl Into<String>) {
        self.state.lock().zones.insert(zone.into());
    }

    pub fn insert_instance(&self, zone: impl Into<String>, instance: Instance) {
        let zone = zone.into();
        let mut state = self.state.lock();
        state.zones.insert(zone.clone());
        state.instances.entry(zone).or_default().push(instance);
    }

    /// Makes every call of `operation` fail with the given API status.
    pub fn fail(&self, operation: Operation, status: u16) {
        self.state.lock().failures.insert((operation, None), status);
    }

    /// Makes calls of `operation` addressing `target` fail with the given API status.
    ///
    /// `target` is an API path (`global/urlMaps/x`) or, for zone-keyed
    /// listings, the zone name.
    pub fn fail_for(&self, operation: Operation, target: impl Into<String>, status: u16) {
        self.state
            .lock()
            .failures
            .insert((operation, Some(target.into())), status);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    pub fn contains(&self, target: &ResourceRef) -> bool {
        self.state.lock().resources.contains_key(target)
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn calls_of(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Successfully deleted references, in deletion order.
    pub fn deleted(&self) -> Vec<ResourceRef> {
        self.state.lock().deleted.clone()
    }

    fn insert(&self, target: ResourceRef, stored: Stored) {
        self.state.lock().resources.insert(target, stored);
    }

    /// Logs the call, then fails it if a matching failure was injected.
    fn record(&self, operation: Operation, target: &str) -> Result<(), ComputeError> {
        let mut state = self.state.lock();
        trace!(?operation, path = target, "in-memory compute call");
        state.calls.push(Call {
            operation,
            target: target.to_string(),
        });
        let status = state
            .failures
            .get(&(operation, Some(target.to_string())))
            .or_else(|| state.failures.get(&(operation, None)))
            .copied();
        match status {
            Some(404) => Err(ComputeError::not_found(target)),
            Some(status) => Err(ComputeError::api(status, format!("injected failure on {target}"))),
            None => Ok(()),
        }
    }

    fn lookup(&self, target: &ResourceRef) -> Result<Stored, ComputeError> {
        self.state
            .lock()
            .resources
            .get(target)
            .cloned()
            .ok_or_else(|| ComputeError::not_found(target.api_path()))
    }

    fn mismatch(target: &ResourceRef) -> ComputeError {
        ComputeError::decode(format!("{} does not hold a {}", target.api_path(), target.kind))
    }
}

#[async_trait]
impl ComputeApi for InMemoryCompute {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn aggregated_forwarding_rules(&self) -> Result<Vec<ForwardingRule>, ComputeError> {
        self.record(Operation::ListForwardingRules, "aggregated/forwardingRules")?;
        Ok(self
            .state
            .lock()
            .resources
            .values()
            .filter_map(|stored| match stored {
                Stored::ForwardingRule(rule) => Some(rule.clone()),
                _ => None,
            })
            .collect())
    }

    async fn get_forwarding_rule(
        &self,
        rule: &ResourceRef,
    ) -> Result<ForwardingRule, ComputeError> {
        self.record(Operation::GetForwardingRule, &rule.api_path())?;
        match self.lookup(rule)? {
            Stored::ForwardingRule(found) => Ok(found),
            _ => Err(Self::mismatch(rule)),
        }
    }

    async fn list_target_proxies(
        &self,
        protocol: ProxyProtocol,
    ) -> Result<Vec<TargetProxy>, ComputeError> {
        let kind = protocol.kind();
        self.record(
            Operation::ListTargetProxies,
            &format!("global/{}", kind.collection()),
        )?;
        Ok(self
            .state
            .lock()
            .resources
            .iter()
            .filter(|(target, _)| target.kind == kind && target.scope == Scope::Global)
            .filter_map(|(_, stored)| match stored {
                Stored::Proxy(proxy) => Some(proxy.clone()),
                _ => None,
            })
            .collect())
    }

    async fn get_target_proxy(&self, proxy: &ResourceRef) -> Result<TargetProxy, ComputeError> {
        self.record(Operation::GetTargetProxy, &proxy.api_path())?;
        match self.lookup(proxy)? {
            Stored::Proxy(found) => Ok(found),
            _ => Err(Self::mismatch(proxy)),
        }
    }

    async fn get_url_map(&self, url_map: &ResourceRef) -> Result<UrlMap, ComputeError> {
        self.record(Operation::GetUrlMap, &url_map.api_path())?;
        match self.lookup(url_map)? {
            Stored::UrlMap(found) => Ok(found),
            _ => Err(Self::mismatch(url_map)),
        }
    }

    async fn get_backend_service(
        &self,
        service: &ResourceRef,
    ) -> Result<BackendService, ComputeError> {
        self.record(Operation::GetBackendService, &service.api_path())?;
        match self.lookup(service)? {
            Stored::BackendService(found) => Ok(found),
            _ => Err(Self::mismatch(service)),
        }
    }

    async fn list_group_members(
        &self,
        group: &ResourceRef,
    ) -> Result<Vec<GroupMember>, ComputeError> {
        self.record(Operation::ListGroupMembers, &group.api_path())?;
        match self.lookup(group)? {
            Stored::InstanceGroup(members) => Ok(members),
            _ => Err(Self::mismatch(group)),
        }
    }

    async fn list_firewalls(&self) -> Result<Vec<Firewall>, ComputeError> {
        self.record(Operation::ListFirewalls, "global/firewalls")?;
        Ok(self
            .state
            .lock()
            .resources
            .values()
            .filter_map(|stored| match stored {
                Stored::Firewall(firewall) => Some(firewall.clone()),
                _ => None,
            })
            .collect())
    }

    async fn list_zones(&self) -> Result<Vec<Zone>, ComputeError> {
        self.record(Operation::ListZones, "zones")?;
        Ok(self
            .state
            .lock()
            .zones
            .iter()
            .map(|name| Zone { name: name.clone() })
            .collect())
    }

    async fn list_instances(&self, zone: &str) -> Result<Vec<Instance>, ComputeError> {
        self.record(Operation::ListInstances, zone)?;
        let state = self.state.lock();
        if !state.zones.contains(zone) {
            return Err(ComputeError::not_found(format!("zones/{zone}")));
        }
        Ok(state.instances.get(zone).cloned().unwrap_or_default())
    }

    async fn delete(&self, target: &ResourceRef) -> Result<(), ComputeError> {
        let path = target.api_path();
        self.record(Operation::Delete, &path)?;
        let mut state = self.state.lock();
        match state.resources.remove(target) {
            Some(_) => {
                state.deleted.push(target.clone());
                Ok(())
            }
            None => Err(ComputeError::not_found(path)),
        }
    }
}
