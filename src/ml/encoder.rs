// ============================================================
// Layer 5 — Transformer Encoder (Burn)
// ============================================================
// A BERT-style encoder that keeps every intermediate activation
// the distillation objective needs:
//
//   input_ids ─┐
//   positions ─┼─► sum ─► LayerNorm ─► Dropout = embedding_output
//   segments  ─┘                │
//                               ▼
//                      ┌─ BertLayer 0 ─┐ ─► hidden_0, scores_0
//                      │      ...      │
//                      └─ BertLayer N ─┘ ─► hidden_N, scores_N
//                               │
//                               ▼
//              first token ─► Dense ─► tanh = pooled_output
//
// Each layer is post-norm:
//   x = LayerNorm(x + Dropout(SelfAttention(x)))
//   x = LayerNorm(x + Dropout(W2 · gelu(W1 · x)))
//
// attention_scores are the scaled dot products QKᵀ/√d_head,
// recorded before the padding mask and the softmax.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Devlin et al. (2019) BERT
//            Jiao et al. (2020) TinyBERT §3.1

use burn::{
    module::Param,
    nn::{
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Initializer,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, softmax, tanh},
};

use crate::ml::config::BertConfig;

/// Added to the attention logits of padded key positions.
pub const MASK_ADDER: f64 = -10000.0;

/// Normal(0, range) initializer used for every dense weight and embedding table.
pub fn normal_initializer(range: f64) -> Initializer {
    Initializer::Normal { mean: 0.0, std: range }
}

/// Dense layer with Normal(0, range) weights and a zero bias.
pub fn dense_layer<B: Backend>(d_in: usize, d_out: usize, range: f64, device: &B::Device) -> Linear<B> {
    let mut linear = LinearConfig::new(d_in, d_out)
        .with_initializer(normal_initializer(range))
        .init(device);
    linear.bias = Some(Param::from_tensor(Tensor::zeros([d_out], device)));
    linear
}

// ─── Construction ─────────────────────────────────────────────────────────────
impl BertConfig {
    /// Build an encoder. With `drop_pooler` the pooled output is the
    /// first token's final hidden state, without the dense + tanh.
    pub fn init_encoder<B: Backend>(&self, drop_pooler: bool, device: &B::Device) -> BertEncoder<B> {
        let init = normal_initializer(self.initializer_range);
        let embed = |rows: usize| -> Embedding<B> {
            EmbeddingConfig::new(rows, self.hidden_size)
                .with_initializer(init.clone())
                .init(device)
        };

        let embeddings = BertEmbeddings {
            word_embeddings:       embed(self.vocab_size),
            position_embeddings:   embed(self.max_position_embeddings),
            token_type_embeddings: embed(self.type_vocab_size),
            layer_norm: LayerNormConfig::new(self.hidden_size)
                .with_epsilon(self.layer_norm_eps)
                .init(device),
            dropout: DropoutConfig::new(self.hidden_dropout_prob).init(),
        };

        let layers = (0..self.num_hidden_layers)
            .map(|_| self.init_layer(device))
            .collect();

        let pooler = (!drop_pooler).then(|| self.dense(self.hidden_size, self.hidden_size, device));

        BertEncoder { embeddings, layers, pooler, hidden_size: self.hidden_size }
    }

    fn dense<B: Backend>(&self, d_in: usize, d_out: usize, device: &B::Device) -> Linear<B> {
        dense_layer(d_in, d_out, self.initializer_range, device)
    }

    fn norm<B: Backend>(&self, device: &B::Device) -> LayerNorm<B> {
        LayerNormConfig::new(self.hidden_size)
            .with_epsilon(self.layer_norm_eps)
            .init(device)
    }

    fn init_layer<B: Backend>(&self, device: &B::Device) -> BertLayer<B> {
        let h = self.hidden_size;
        let attention = BertSelfAttention {
            query:     self.dense(h, h, device),
            key:       self.dense(h, h, device),
            value:     self.dense(h, h, device),
            output:    self.dense(h, h, device),
            dropout:   DropoutConfig::new(self.attention_probs_dropout_prob).init(),
            num_heads: self.num_attention_heads,
            head_dim:  self.head_dim(),
        };
        BertLayer {
            attention,
            attention_dropout: DropoutConfig::new(self.hidden_dropout_prob).init(),
            attention_norm:    self.norm(device),
            intermediate:      self.dense(h, self.intermediate_size, device),
            output:            self.dense(self.intermediate_size, h, device),
            output_dropout:    DropoutConfig::new(self.hidden_dropout_prob).init(),
            output_norm:       self.norm(device),
        }
    }
}

// ─── Embeddings ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BertEmbeddings<B: Backend> {
    pub word_embeddings:       Embedding<B>,
    pub position_embeddings:   Embedding<B>,
    pub token_type_embeddings: Embedding<B>,
    pub layer_norm:            LayerNorm<B>,
    pub dropout:               Dropout,
}

impl<B: Backend> BertEmbeddings<B> {
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, segment_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &input_ids.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);

        let x = self.word_embeddings.forward(input_ids)
            + self.position_embeddings.forward(positions)
            + self.token_type_embeddings.forward(segment_ids);

        self.dropout.forward(self.layer_norm.forward(x))
    }
}

// ─── Self-Attention ───────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BertSelfAttention<B: Backend> {
    pub query:     Linear<B>,
    pub key:       Linear<B>,
    pub value:     Linear<B>,
    pub output:    Linear<B>,
    pub dropout:   Dropout,
    pub num_heads: usize,
    pub head_dim:  usize,
}

impl<B: Backend> BertSelfAttention<B> {
    /// `[batch, seq, hidden]` → `[batch, heads, seq, head_dim]`
    fn split_heads(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch_size, seq_len, _] = x.dims();
        x.reshape([batch_size, seq_len, self.num_heads, self.head_dim])
            .swap_dims(1, 2)
    }

    /// Returns the projected context `[batch, seq, hidden]` and the raw
    /// scores `[batch, heads, seq, seq]`.
    pub fn forward(&self, x: Tensor<B, 3>, mask_adder: Tensor<B, 4>) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let [batch_size, seq_len, hidden] = x.dims();

        let q = self.split_heads(self.query.forward(x.clone()));
        let k = self.split_heads(self.key.forward(x.clone()));
        let v = self.split_heads(self.value.forward(x));

        let scores = q
            .matmul(k.swap_dims(2, 3))
            .div_scalar((self.head_dim as f64).sqrt());

        let probs = self.dropout.forward(softmax(scores.clone() + mask_adder, 3));

        let context = probs
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch_size, seq_len, hidden]);

        (self.output.forward(context), scores)
    }
}

// ─── Encoder Layer ────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BertLayer<B: Backend> {
    pub attention:         BertSelfAttention<B>,
    pub attention_dropout: Dropout,
    pub attention_norm:    LayerNorm<B>,
    pub intermediate:      Linear<B>,
    pub output:            Linear<B>,
    pub output_dropout:    Dropout,
    pub output_norm:       LayerNorm<B>,
}

impl<B: Backend> BertLayer<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask_adder: Tensor<B, 4>) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let (attended, scores) = self.attention.forward(x.clone(), mask_adder);
        let x = self.attention_norm.forward(x + self.attention_dropout.forward(attended));

        let ffn = self.output.forward(gelu(self.intermediate.forward(x.clone())));
        let x = self.output_norm.forward(x + self.output_dropout.forward(ffn));

        (x, scores)
    }
}

// ─── Encoder ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BertEncoder<B: Backend> {
    pub embeddings:  BertEmbeddings<B>,
    pub layers:      Vec<BertLayer<B>>,
    pub pooler:      Option<Linear<B>>,
    pub hidden_size: usize,
}

/// Every activation of one encoder pass.
#[derive(Debug, Clone)]
pub struct EncoderOutput<B: Backend> {
    /// `[batch, seq, hidden]`
    pub embedding_output:   Tensor<B, 3>,
    /// One `[batch, seq, hidden]` per layer
    pub all_encoder_layers: Vec<Tensor<B, 3>>,
    /// One `[batch, heads, seq, seq]` per layer, before mask and softmax
    pub attention_scores:   Vec<Tensor<B, 4>>,
    /// `[batch, hidden]`
    pub pooled_output:      Tensor<B, 2>,
}

impl<B: Backend> EncoderOutput<B> {
    /// Final layer hidden states.
    pub fn sequence_output(&self) -> Tensor<B, 3> {
        self.all_encoder_layers
            .last()
            .cloned()
            .unwrap_or_else(|| self.embedding_output.clone())
    }

    /// Cut every activation out of the autodiff graph.
    pub fn detach(self) -> Self {
        Self {
            embedding_output:   self.embedding_output.detach(),
            all_encoder_layers: self.all_encoder_layers.into_iter().map(Tensor::detach).collect(),
            attention_scores:   self.attention_scores.into_iter().map(Tensor::detach).collect(),
            pooled_output:      self.pooled_output.detach(),
        }
    }
}

/// `[batch, seq]` 0/1 mask → `[batch, 1, 1, seq]` additive logits mask.
pub fn attention_mask_adder<B: Backend>(input_mask: Tensor<B, 2, Int>) -> Tensor<B, 4> {
    let [batch_size, seq_len] = input_mask.dims();
    input_mask
        .float()
        .neg()
        .add_scalar(1.0)
        .mul_scalar(MASK_ADDER)
        .reshape([batch_size, 1, 1, seq_len])
}

impl<B: Backend> BertEncoder<B> {
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// input_ids, input_mask, segment_ids: `[batch, seq]`
    pub fn forward(
        &self,
        input_ids:   Tensor<B, 2, Int>,
        input_mask:  Tensor<B, 2, Int>,
        segment_ids: Tensor<B, 2, Int>,
    ) -> EncoderOutput<B> {
        let mask_adder       = attention_mask_adder(input_mask);
        let embedding_output = self.embeddings.forward(input_ids, segment_ids);

        let mut all_encoder_layers = Vec::with_capacity(self.layers.len());
        let mut attention_scores   = Vec::with_capacity(self.layers.len());
        let mut hidden = embedding_output.clone();
        for layer in &self.layers {
            let (next, scores) = layer.forward(hidden, mask_adder.clone());
            all_encoder_layers.push(next.clone());
            attention_scores.push(scores);
            hidden = next;
        }

        let [batch_size, _, hidden_size] = hidden.dims();
        let first_token = hidden
            .slice([0..batch_size, 0..1, 0..hidden_size])
            .reshape([batch_size, hidden_size]);
        let pooled_output = match &self.pooler {
            Some(dense) => tanh(dense.forward(first_token)),
            None        => first_token,
        };

        EncoderOutput { embedding_output, all_encoder_layers, attention_scores, pooled_output }
    }
}
