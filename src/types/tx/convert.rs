#![forbid(unsafe_code)]

use super::{
    parse_contract, tx_envelope, Envelope, Params, Transaction, TxEnvelope, TxRequest, TxResponse,
    CHAIN_ID_LABEL, CHAIN_UUID_LABEL, TX_HASH_LABEL,
};
use crate::errors::{self, TxError};

impl Envelope {
    pub fn tx_request(&self) -> TxRequest {
        let mut req = TxRequest {
            id: self.id.clone(),
            headers: self.headers.clone(),
            chain: self.chain.chain_name.clone(),
            params: Some(Params {
                from: self.from_checksum(),
                to: self.to_checksum(),
                gas: self.gas_string(),
                gas_price: self.gas_price_string(),
                value: self.value_string(),
                nonce: self.nonce_string(),
                data: self.tx.data.clone(),
                contract: self.short_contract(),
                method_signature: self.contract.method_signature.clone(),
                args: self.contract.args.clone(),
                raw: self.tx.raw.clone(),
                private_for: self.private.private_for.clone(),
                private_from: self.private.private_from.clone(),
                private_tx_type: self.private.private_tx_type.clone(),
                privacy_group_id: self.private.privacy_group_id.clone(),
            }),
            context_labels: self.context_labels.clone(),
            ..TxRequest::default()
        };
        req.set_method(self.method);
        req.set_job_type(self.job_type);
        req
    }

    pub fn tx_response(&self) -> TxResponse {
        TxResponse {
            headers: self.headers.clone(),
            id: self.id.clone(),
            job_uuid: self.job_uuid().to_string(),
            context_labels: self.context_labels.clone(),
            transaction: Some(Transaction {
                from: self.from_checksum(),
                nonce: self.nonce_string(),
                to: self.to_checksum(),
                value: self.value_string(),
                gas: self.gas_string(),
                gas_price: self.gas_price_string(),
                data: self.tx.data.clone(),
                raw: self.tx.raw.clone(),
                tx_hash: self.tx_hash_string(),
            }),
            receipt: self.receipt.clone(),
            chain: self.chain.chain_name.clone(),
            errors: self.errors.clone(),
        }
    }

    /// Copies the fields that have no first-class wire slot into the internal labels.
    pub fn fields_to_internal(&mut self) {
        if self.chain.chain_id.is_some() {
            let chain_id = self.chain_id_string();
            self.internal_labels.insert(CHAIN_ID_LABEL.to_string(), chain_id);
        }
        if self.tx.tx_hash.is_some() {
            let tx_hash = self.tx_hash_string();
            self.internal_labels.insert(TX_HASH_LABEL.to_string(), tx_hash);
        }
        if !self.chain.chain_uuid.is_empty() {
            self.internal_labels
                .insert(CHAIN_UUID_LABEL.to_string(), self.chain.chain_uuid.clone());
        }
    }

    /// Restores fields from the internal labels. A malformed label is an error,
    /// a missing one leaves the field untouched.
    pub fn internal_to_fields(&mut self) -> Result<(), TxError> {
        if let Some(tx_hash) = self.internal_labels.get(TX_HASH_LABEL).cloned() {
            self.set_tx_hash_string(&tx_hash)?;
        }
        if let Some(chain_id) = self.internal_labels.get(CHAIN_ID_LABEL).cloned() {
            self.set_chain_id_string(&chain_id)?;
        }
        if let Some(chain_uuid) = self.internal_labels.get(CHAIN_UUID_LABEL).cloned() {
            self.set_chain_uuid(chain_uuid);
        }
        Ok(())
    }

    pub fn tx_envelope_as_request(&mut self) -> TxEnvelope {
        self.fields_to_internal();
        TxEnvelope {
            msg: Some(tx_envelope::Msg::TxRequest(self.tx_request())),
            internal_labels: self.internal_labels.clone(),
        }
    }

    pub fn tx_envelope_as_response(&mut self) -> TxEnvelope {
        self.fields_to_internal();
        TxEnvelope {
            msg: Some(tx_envelope::Msg::TxResponse(self.tx_response())),
            internal_labels: self.internal_labels.clone(),
        }
    }
}

impl TxRequest {
    pub fn envelope(&self) -> Result<Envelope, TxError> {
        let envelope = self.load()?;
        validated(envelope)
    }

    fn load(&self) -> Result<Envelope, TxError> {
        let mut envelope = Envelope::new();
        envelope
            .set_id(self.id.clone())
            .set_chain_name(self.chain.clone())
            .set_method(self.method())
            .set_job_type(self.job_type());
        envelope.headers = self.headers.clone();
        envelope.context_labels = self.context_labels.clone();

        let params = self.params.clone().unwrap_or_default();
        envelope.tx.data = params.data.clone();
        envelope.tx.raw = params.raw.clone();
        envelope
            .set_method_signature(params.method_signature.clone())
            .set_args(params.args.clone())
            .set_private_for(params.private_for.clone())
            .set_private_from(params.private_from.clone())
            .set_private_tx_type(params.private_tx_type.clone())
            .set_privacy_group_id(params.privacy_group_id.clone());

        load_scalar_fields(
            &mut envelope,
            ScalarFields {
                gas: &params.gas,
                nonce: &params.nonce,
                gas_price: &params.gas_price,
                value: &params.value,
                from: &params.from,
                to: &params.to,
            },
        )?;

        let (name, tag) = parse_contract(&params.contract);
        envelope.set_contract_name(name).set_contract_tag(tag);

        Ok(envelope)
    }
}

impl TxResponse {
    pub fn envelope(&self) -> Result<Envelope, TxError> {
        let envelope = self.load()?;
        validated(envelope)
    }

    fn load(&self) -> Result<Envelope, TxError> {
        let mut envelope = Envelope::new();
        envelope
            .set_id(self.id.clone())
            .set_chain_name(self.chain.clone())
            .append_errors(self.errors.iter().cloned());
        envelope.headers = self.headers.clone();
        envelope.context_labels = self.context_labels.clone();
        envelope.receipt = self.receipt.clone();
        if !self.job_uuid.is_empty() {
            envelope.set_job_uuid(self.job_uuid.clone());
        }

        let transaction = self.transaction.clone().unwrap_or_default();
        envelope.tx.data = transaction.data.clone();
        envelope.tx.raw = transaction.raw.clone();

        load_scalar_fields(
            &mut envelope,
            ScalarFields {
                gas: &transaction.gas,
                nonce: &transaction.nonce,
                gas_price: &transaction.gas_price,
                value: &transaction.value,
                from: &transaction.from,
                to: &transaction.to,
            },
        )?;
        envelope.set_tx_hash_string(&transaction.tx_hash)?;

        Ok(envelope)
    }
}

impl TxEnvelope {
    /// Rebuilds the envelope, restoring internal labels before validating so
    /// label-only fields take part in the invariants.
    pub fn envelope(&self) -> Result<Envelope, TxError> {
        let mut envelope = match &self.msg {
            Some(tx_envelope::Msg::TxRequest(req)) => req.load()?,
            Some(tx_envelope::Msg::TxResponse(res)) => res.load()?,
            None => return Err(errors::data_error("invalid tx envelope")),
        };

        envelope.internal_labels = self.internal_labels.clone();
        envelope.internal_to_fields()?;

        validated(envelope)
    }
}

struct ScalarFields<'a> {
    gas: &'a str,
    nonce: &'a str,
    gas_price: &'a str,
    value: &'a str,
    from: &'a str,
    to: &'a str,
}

fn load_scalar_fields(envelope: &mut Envelope, fields: ScalarFields<'_>) -> Result<(), TxError> {
    let outcomes = [
        envelope.set_gas_string(fields.gas).map(drop),
        envelope.set_nonce_string(fields.nonce).map(drop),
        envelope.set_gas_price_string(fields.gas_price).map(drop),
        envelope.set_value_string(fields.value).map(drop),
        envelope.set_from_string(fields.from).map(drop),
        envelope.set_to_string(fields.to).map(drop),
    ];
    let failures: Vec<String> = outcomes
        .into_iter()
        .filter_map(Result::err)
        .map(|err| err.message)
        .collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(errors::data_error(failures.join("; ")))
    }
}

fn validated(envelope: Envelope) -> Result<Envelope, TxError> {
    let violations = envelope.validate();
    if violations.is_empty() {
        return Ok(envelope);
    }
    let messages: Vec<String> = violations.into_iter().map(|err| err.message).collect();
    Err(errors::data_error(messages.join("; ")))
}
