//! Hickory DNS authority serving the current fixture zone.

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::{A, AAAA, CNAME, MX, NS, SOA, SRV, TXT};
use hickory_proto::rr::{DNSClass, LowerName, Name, RData, Record, RecordSet, RecordType};
use hickory_proto::ProtoError;
use hickory_server::authority::{
    Authority, LookupControlFlow, LookupError, LookupOptions, LookupRecords, MessageRequest,
    UpdateResult, ZoneType,
};
use hickory_server::server::RequestInfo;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::config::DnsConfig;
use crate::metrics::{self, QueryResult, Timer};
use crate::record::{normalize_name, text_chunks, Payload, RecordKind, ResourceRecord};
use crate::resolver::{self, Query};
use crate::state::DnsState;

/// Convert a record payload into hickory rdata.
fn to_rdata(kind: RecordKind, data: &Payload) -> Result<RData, ProtoError> {
    let rdata = match data {
        Payload::Address(IpAddr::V4(ip)) => RData::A(A::from(*ip)),
        Payload::Address(IpAddr::V6(ip)) => RData::AAAA(AAAA::from(*ip)),
        Payload::Srv {
            priority,
            weight,
            port,
            target,
        } => RData::SRV(SRV::new(*priority, *weight, *port, Name::from_ascii(target)?)),
        Payload::Text(text) => RData::TXT(TXT::new(text_chunks(text))),
        Payload::Name(target) if kind == RecordKind::NS => RData::NS(NS(Name::from_ascii(target)?)),
        Payload::Name(target) => RData::CNAME(CNAME(Name::from_ascii(target)?)),
        Payload::Mx {
            preference,
            exchange,
        } => RData::MX(MX::new(*preference, Name::from_ascii(exchange)?)),
        Payload::Soa {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        } => RData::SOA(SOA::new(
            Name::from_ascii(mname)?,
            Name::from_ascii(rname)?,
            *serial,
            soa_timer("refresh", *refresh)?,
            soa_timer("retry", *retry)?,
            soa_timer("expire", *expire)?,
            *minimum,
        )),
    };
    Ok(rdata)
}

/// SOA refresh/retry/expire are signed 32-bit on the wire.
fn soa_timer(field: &str, value: u32) -> Result<i32, ProtoError> {
    i32::try_from(value)
        .map_err(|_| ProtoError::from(format!("SOA {field} {value} exceeds {}", i32::MAX)))
}

/// Authority answering from the zone snapshot held by a [`DnsState`].
///
/// Lookups are exact: no recursion, no CNAME chasing, no wildcards. Unknown
/// names get NXDOMAIN; names that exist without the queried type get an empty
/// NOERROR answer.
pub struct FixtureAuthority {
    origin: LowerName,
    state: DnsState,
    config: Arc<DnsConfig>,
}

impl FixtureAuthority {
    /// Create a new authority for the given configuration and state.
    pub fn new(config: DnsConfig, state: DnsState) -> Result<Self, ProtoError> {
        let origin = Name::from_ascii(normalize_name(&config.zone))?.into();
        soa_timer("refresh", config.soa.refresh)?;
        soa_timer("retry", config.soa.retry)?;
        soa_timer("expire", config.soa.expire)?;

        Ok(Self {
            origin,
            state,
            config: Arc::new(config),
        })
    }

    /// Build a record set from zone records sharing one (name, type).
    fn build_record_set(
        &self,
        name: Name,
        rtype: RecordType,
        records: &[ResourceRecord],
    ) -> Result<RecordSet, ProtoError> {
        let mut record_set = RecordSet::new(name.clone(), rtype, self.state.serial());

        for entry in records {
            let rdata = to_rdata(entry.kind(), entry.data())?;
            let mut record = Record::from_rdata(name.clone(), entry.ttl(), rdata);
            record.set_dns_class(DNSClass::IN);
            record_set.insert(record, 0);
        }

        Ok(record_set)
    }

    /// Build the SOA record for this zone from configuration.
    fn build_soa_record(&self) -> Result<RecordSet, ProtoError> {
        let soa = &self.config.soa;
        let soa = SOA::new(
            Name::from_ascii(normalize_name(&soa.mname))?,
            Name::from_ascii(normalize_name(&soa.rname))?,
            self.state.serial(),
            soa_timer("refresh", soa.refresh)?,
            soa_timer("retry", soa.retry)?,
            soa_timer("expire", soa.expire)?,
            soa.minimum,
        );

        let name = Name::from(self.origin.clone());
        let mut record_set = RecordSet::new(name.clone(), RecordType::SOA, 0);
        let mut record = Record::from_rdata(name, self.config.soa.minimum, RData::SOA(soa));
        record.set_dns_class(DNSClass::IN);
        record_set.insert(record, 0);

        Ok(record_set)
    }

    /// Build an NS record for this zone from configuration.
    fn build_ns_record(&self) -> Result<RecordSet, ProtoError> {
        let name = Name::from(self.origin.clone());
        let ns_name = Name::from_ascii(normalize_name(&self.config.soa.mname))?;

        let mut record_set = RecordSet::new(name.clone(), RecordType::NS, 0);
        let mut record = Record::from_rdata(name, self.config.soa.minimum, RData::NS(NS(ns_name)));
        record.set_dns_class(DNSClass::IN);
        record_set.insert(record, 0);

        Ok(record_set)
    }

    /// Answer one question against the current snapshot.
    fn answer(
        &self,
        name: &LowerName,
        rtype: RecordType,
        id: u16,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<LookupRecords> {
        let timer = Timer::start();
        let rtype_str = rtype.to_string();

        if !self.origin.zone_of(name) {
            debug!(name = %name, origin = %self.origin, "query outside zone");
            metrics::record_query(&rtype_str, QueryResult::Refused, timer.elapsed());
            return LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::Refused)));
        }

        // Pin one snapshot for the whole answer.
        let zone = self.state.load();
        let name_str = name.to_string();
        let is_apex = *name == self.origin;
        let kind = RecordKind::try_from(rtype).ok();

        trace!(name = %name_str, rtype = %rtype, id, "DNS lookup");

        let records = match kind {
            Some(kind) => resolver::resolve(&zone, &Query::new(&name_str, kind).with_id(id)).records,
            None => Vec::new(),
        };

        let record_set = if !records.is_empty() {
            self.build_record_set(Name::from(name.clone()), rtype, &records)
        } else if is_apex && kind == Some(RecordKind::SOA) {
            self.build_soa_record()
        } else if is_apex && kind == Some(RecordKind::NS) {
            self.build_ns_record()
        } else if is_apex || zone.name_exists(&name_str) {
            debug!(name = %name_str, rtype = %rtype, "no data for existing name");
            metrics::record_query(&rtype_str, QueryResult::NoData, timer.elapsed());
            return LookupControlFlow::Break(Err(LookupError::NameExists));
        } else {
            debug!(name = %name_str, rtype = %rtype, "name not found");
            metrics::record_query(&rtype_str, QueryResult::NxDomain, timer.elapsed());
            return LookupControlFlow::Break(Err(LookupError::ResponseCode(
                ResponseCode::NXDomain,
            )));
        };

        match record_set {
            Ok(record_set) => {
                let count = record_set.records_without_rrsigs().count();
                debug!(name = %name_str, rtype = %rtype, count, "returning records");
                metrics::record_answer_records(count);
                metrics::record_query(&rtype_str, QueryResult::Success, timer.elapsed());
                LookupControlFlow::Break(Ok(LookupRecords::new(
                    lookup_options,
                    Arc::new(record_set),
                )))
            }
            Err(error) => {
                warn!(name = %name_str, rtype = %rtype, %error, "failed to encode records");
                LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::ServFail)))
            }
        }
    }
}

#[async_trait]
impl Authority for FixtureAuthority {
    type Lookup = LookupRecords;

    fn zone_type(&self) -> ZoneType {
        ZoneType::Primary
    }

    fn is_axfr_allowed(&self) -> bool {
        false
    }

    fn origin(&self) -> &LowerName {
        &self.origin
    }

    async fn lookup(
        &self,
        name: &LowerName,
        rtype: RecordType,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        self.answer(name, rtype, 0, lookup_options)
    }

    async fn search(
        &self,
        request_info: RequestInfo<'_>,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        self.answer(
            request_info.query.name(),
            request_info.query.query_type(),
            request_info.header.id(),
            lookup_options,
        )
    }

    async fn get_nsec_records(
        &self,
        _name: &LowerName,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        // DNSSEC not supported
        LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
    }

    async fn update(&self, _update: &MessageRequest) -> UpdateResult<bool> {
        // Dynamic updates not supported
        Err(ResponseCode::NotImp)
    }
}
